use std::path::PathBuf;

use thiserror::Error;

use crate::types::{RunPhase, WorldHandle};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("world creation failed: {0}")]
    WorldCreation(String),
    #[error("world {0:?} could not be destroyed: {1}")]
    WorldTeardown(WorldHandle, String),
    #[error("world {0:?} is not available")]
    WorldUnavailable(WorldHandle),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress ({phase:?})")]
    RunInProgress { phase: RunPhase },
    #[error("world provider failed: {0}")]
    WorldProvider(#[from] HostError),
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}
