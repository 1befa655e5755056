use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

pub use crate::config::ConfigError;

/// Why a session failed to come up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to spawn transcoder: {0}")]
    Spawn(std::io::Error),
    #[error("No output appeared at {path} within {waited_ms}ms")]
    ArtifactTimeout { path: PathBuf, waited_ms: u64 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("Session not found: {0}")]
    NotFound(Uuid),
    #[error("Output directory is already owned by a live session: {0}")]
    DirectoryInUse(PathBuf),
}
