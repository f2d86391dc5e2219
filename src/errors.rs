//! Typed error hierarchy for the loop.
//!
//! - `InvalidTransitionError`: an event applied from a phase that does not define it
//! - `PersistenceError`: the snapshot file could not be read or written
//! - `AgentError`: the external agent failed or was aborted mid-session
//! - `OrchestratorError`: what the driver loop surfaces to its caller

use crate::machine::{EventKind, Phase};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition: event {event} is not allowed from phase {phase}")]
pub struct InvalidTransitionError {
    pub phase: Phase,
    pub event: EventKind,
}

/// Storage-layer failures on the snapshot file. Always fatal to a run.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read snapshot at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot at {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to create state directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot at {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of a single agent invocation. Retryable by the driver.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Failed to spawn agent process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Agent exited with non-zero code {exit_code}")]
    NonZeroExit { exit_code: i32 },

    #[error("Agent reported an error: {message}")]
    Reported { message: String },
}

/// Errors surfaced by the driver loop.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransitionError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    AgentInvocation(#[from] AgentError),

    #[error("Halting after {count} consecutive fallback transitions without an explicit directive")]
    FallbackLimit { count: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
