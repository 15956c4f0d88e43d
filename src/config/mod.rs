mod error;
mod service;
mod types;

pub use error::ConfigError;
pub use service::{apply_env_overrides, ensure_storage_dirs, resolve, ConfigService};
pub use types::*;
