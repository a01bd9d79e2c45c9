//! Typed error hierarchy for the storyforge orchestrator.
//!
//! Three top-level enums cover the three fallible subsystems:
//! - `OrchestratorError`: agent process and version-control failures
//! - `DiscoveryError`: the story sequencer cannot produce work
//! - `StoreError`: item record and ledger persistence failures

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the orchestrator subsystem (agent invocation and git).
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Failed to spawn agent process '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write prompt file at {path}: {source}")]
    PromptWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write output file at {path}: {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Agent process I/O failed: {0}")]
    ProcessIo(#[source] std::io::Error),

    #[error("Git tracker error: {0}")]
    GitTracker(String),
}

impl From<git2::Error> for OrchestratorError {
    fn from(err: git2::Error) -> Self {
        OrchestratorError::GitTracker(err.message().to_string())
    }
}

/// Errors raised before any phase runs, while building the story sequence.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("No stories found for epic {epic_id} (searched: {})", display_paths(.searched))]
    NoStories {
        epic_id: String,
        searched: Vec<PathBuf>,
    },

    #[error("--start-from '{cursor}' matched none of the {available} discovered stories")]
    CursorNotFound { cursor: String, available: usize },

    #[error("Invalid epic id '{0}': only letters, digits, '-', '_' and '.' are allowed")]
    InvalidEpicId(String),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from the item record store and the aggregate ledger.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Story {0} has no backing record")]
    MissingRecord(String),
}
