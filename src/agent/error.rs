use std::path::PathBuf;

use thiserror::Error;

use super::args::ArgsError;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Invalid agent argument template: {0}")]
    InvalidArgs(#[from] ArgsError),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Agent process exited with {status}\n{output}")]
    ProcessFailed { status: String, output: String },

    #[error("Failed to start agent process '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout(_))
    }
}

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Failed to read memory file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write memory file {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Memory item is empty")]
    EmptyItem,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("empty image path")]
    EmptyPath,

    #[error("path is a directory")]
    IsDirectory,

    #[error("{0}")]
    Stat(#[from] std::io::Error),
}
