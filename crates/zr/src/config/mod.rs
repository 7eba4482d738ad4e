//! The Config Model: reads layered `zr.toml` files and resolves them into the
//! typed tree the rest of the engine consumes.

mod error;
mod loader;
mod processed;
mod raw;
mod schema;
mod validate;

pub use error::{ConfigError, ValidationError, ValidationErrors, ValidationWarning};
pub use loader::{load, load_with_warnings, member_task_owners};
pub use processed::{CacheConfig, Config, ConfigOverrides, MemberInfo, RemoteCacheConfig, Stage, Workflow};
pub use schema::SCHEMA;
