//! A cache that never stores anything and never has a hit. Used for
//! `--dry-run` (the Scheduler must still be able to call `lookup`/`store`
//! without special-casing) and as the degrade target when the local store
//! becomes unavailable mid-run.

use std::path::Path;

use crate::{
    entry::{ClearSummary, Entry, StatusSummary},
    error::CacheError,
    store::CacheStore,
};

#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheStore;

impl CacheStore for NullCacheStore {
    fn lookup(&self, _fingerprint: &str) -> Result<Option<Entry>, CacheError> {
        Ok(None)
    }

    fn store(&self, _entry: &Entry) -> Result<(), CacheError> {
        Ok(())
    }

    fn replay(&self, _entry: &Entry, _destination: &Path) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self, dry_run: bool) -> Result<ClearSummary, CacheError> {
        Ok(ClearSummary {
            entries_removed: 0,
            bytes_removed: 0,
            dry_run,
        })
    }

    fn remove(&self, _fingerprint: &str, dry_run: bool) -> Result<ClearSummary, CacheError> {
        Ok(ClearSummary { entries_removed: 0, bytes_removed: 0, dry_run })
    }

    fn status(&self) -> Result<StatusSummary, CacheError> {
        Ok(StatusSummary::default())
    }
}
