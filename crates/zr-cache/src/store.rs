use std::path::Path;

use crate::{
    entry::{ClearSummary, Entry, StatusSummary},
    error::CacheError,
};

/// The contract every cache backend implements, per spec.md §4.4. The core
/// only ships `LocalCacheStore`; a remote (HTTP) backend is an optional
/// layer over the same trait that nothing in this crate dials.
pub trait CacheStore {
    fn lookup(&self, fingerprint: &str) -> Result<Option<Entry>, CacheError>;

    /// Writes every file of `entry` atomically (write-to-temp, then
    /// rename). Concurrent writers for the same fingerprint never
    /// interleave: the entire entry lands in a staging directory that gets
    /// renamed into place as one unit, so the final state is always either
    /// the old entry or one writer's complete new entry.
    fn store(&self, entry: &Entry) -> Result<(), CacheError>;

    /// Re-materializes `entry`'s captured output files under `destination`.
    fn replay(&self, entry: &Entry, destination: &Path) -> Result<(), CacheError>;

    fn clear(&self, dry_run: bool) -> Result<ClearSummary, CacheError>;

    /// Removes a single entry by fingerprint, used by `cache clear
    /// --selective=<task>` to drop just the entries a given task currently
    /// resolves to, rather than the whole store. A no-op if the fingerprint
    /// isn't present.
    fn remove(&self, fingerprint: &str, dry_run: bool) -> Result<ClearSummary, CacheError>;

    fn status(&self) -> Result<StatusSummary, CacheError>;
}
