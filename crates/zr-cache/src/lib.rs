//! Local, content-addressed storage for captured task outputs, per
//! spec.md §4.4: `lookup`/`store`/`replay`/`clear`/`status` over
//! `<root>/.zr/cache/<prefix>/<fingerprint>/`.
//!
//! Grounded in `turborepo-cache`'s `fs` backend for the capture-then-commit
//! shape, flattened to the plain-file-per-stream layout spec.md §6 wants
//! instead of that crate's tar archive format. The remote (HTTP) backend
//! that crate layers on top is recognized only in configuration here — see
//! DESIGN.md — since spec.md treats remote cache as an optional layer the
//! core never dials.

mod entry;
mod error;
mod local;
mod null;
mod store;

pub use entry::{ClearSummary, Entry, Meta, Outputs, StatusSummary};
pub use error::CacheError;
pub use local::LocalCacheStore;
pub use null::NullCacheStore;
pub use store::CacheStore;
