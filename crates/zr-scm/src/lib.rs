//! Changed-path detection and affected-task mapping against git, per
//! spec.md §4.9. Grounded in `turborepo-lib`'s `git2` dependency choice;
//! the original `turborepo-scm` crate's diff implementation wasn't present
//! in the retrieval pack, so the diff and affected-mapping logic here is
//! written directly against `git2`'s tree-diffing API, keeping that crate's
//! narrow single-backend boundary.

mod affected;
mod diff;
mod error;

#[cfg(test)]
mod test_utils;

pub use affected::{
    affected_task_names, expand, expand_dependencies, expand_dependents, member_affected,
    ExpansionFlags,
};
pub use diff::Scm;
pub use error::ScmError;
