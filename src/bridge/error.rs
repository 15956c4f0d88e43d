use std::path::PathBuf;

use thiserror::Error;

use crate::agent::{AgentError, MemoryError};
use crate::config::ConfigError;
use crate::session::SessionStoreError;

/// Failures that stop the bridge from starting or reading its input.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to load session store: {0}")]
    Session(#[from] SessionStoreError),

    #[error("Failed to prepare memory file: {0}")]
    Memory(#[from] MemoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ScreenshotError {
    #[error("Failed to create image directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0}")]
    Capture(#[from] AgentError),

    #[error("capture produced no file at {0}")]
    Missing(PathBuf),
}
