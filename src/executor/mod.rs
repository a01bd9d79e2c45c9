//! Phase execution boundary.
//!
//! The pipeline only ever sees a [`PhaseOutcome`]. How a phase is carried out
//! (an external agent process, a scripted mock in tests) lives behind the
//! [`PhaseExecutor`] trait.

pub mod claude;
pub mod prompt;
pub mod sentinel;
pub mod stream;

pub use claude::ClaudeExecutor;
pub use sentinel::{Sentinels, classify};

use crate::errors::OrchestratorError;
use crate::story::{StoryId, WorkItem};
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Which isolated step is being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    Dev,
    Review,
    Report,
}

impl PhaseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PhaseKind::Dev => "dev",
            PhaseKind::Review => "review",
            PhaseKind::Report => "report",
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one phase invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseOutcome {
    Success,
    /// The failure sentinel was emitted, with the reason that followed it.
    Blocked(String),
    /// Neither sentinel appeared in the output.
    Unparsed,
}

impl PhaseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PhaseOutcome::Success)
    }

    /// Human-readable failure description; `None` for success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            PhaseOutcome::Success => None,
            PhaseOutcome::Blocked(reason) => Some(format!("blocked: {}", reason)),
            PhaseOutcome::Unparsed => Some("no completion marker in agent output".to_string()),
        }
    }
}

/// The story a phase operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryRef {
    pub id: StoryId,
    pub record: PathBuf,
}

/// Everything the executor needs to build a self-contained phase payload.
#[derive(Debug, Clone)]
pub struct PhaseRequest {
    pub kind: PhaseKind,
    pub epic_id: String,
    pub story: Option<StoryRef>,
    pub attempt: u32,
    /// Reason the previous attempt failed, passed to the agent on retries.
    pub previous_failure: Option<String>,
    /// Story records handed to the aggregate report phase.
    pub inputs: Vec<PathBuf>,
}

impl PhaseRequest {
    pub fn for_story(
        kind: PhaseKind,
        epic_id: &str,
        item: &WorkItem,
        attempt: u32,
        previous_failure: Option<String>,
    ) -> Self {
        Self {
            kind,
            epic_id: epic_id.to_string(),
            story: item.primary_location().map(|record| StoryRef {
                id: item.id.clone(),
                record: record.to_path_buf(),
            }),
            attempt,
            previous_failure,
            inputs: Vec::new(),
        }
    }

    pub fn for_report(epic_id: &str, inputs: Vec<PathBuf>) -> Self {
        Self {
            kind: PhaseKind::Report,
            epic_id: epic_id.to_string(),
            story: None,
            attempt: 1,
            previous_failure: None,
            inputs,
        }
    }

    /// Short label used for transcript file names and log fields.
    pub fn label(&self) -> String {
        match &self.story {
            Some(story) => format!(
                "{}-{}-{}-attempt-{}",
                self.epic_id, story.id, self.kind, self.attempt
            ),
            None => format!("{}-{}", self.epic_id, self.kind),
        }
    }
}

/// Runs one phase to completion and classifies the result.
///
/// Implementations may block for as long as the phase takes; no timeout is
/// implied by this trait.
#[async_trait]
pub trait PhaseExecutor: Send + Sync {
    async fn execute(&self, request: &PhaseRequest) -> Result<PhaseOutcome, OrchestratorError>;
}
