//! Version-control collaborator.
//!
//! The pipeline only needs "stage everything" and "commit with a message";
//! "nothing to commit" is an ordinary outcome, not an error.

pub mod git;

pub use git::GitTracker;

use crate::errors::OrchestratorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(String),
    NothingToCommit,
}

pub trait VersionControl {
    fn stage_all(&self) -> Result<(), OrchestratorError>;
    fn commit(&self, message: &str) -> Result<CommitOutcome, OrchestratorError>;
}

/// Commit message for a completed story.
pub fn story_commit_message(epic_id: &str, story_id: &str) -> String {
    format!("feat(epic-{}): complete story {}", epic_id, story_id)
}

#[cfg(test)]
pub mod memory {
    //! Recording VCS used by pipeline tests.

    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingVcs {
        pub staged: Mutex<u32>,
        pub commits: Mutex<Vec<String>>,
        /// Next commit reports nothing to commit.
        pub clean: Mutex<bool>,
    }

    impl VersionControl for RecordingVcs {
        fn stage_all(&self) -> Result<(), OrchestratorError> {
            *self.staged.lock().unwrap() += 1;
            Ok(())
        }

        fn commit(&self, message: &str) -> Result<CommitOutcome, OrchestratorError> {
            if std::mem::take(&mut *self.clean.lock().unwrap()) {
                return Ok(CommitOutcome::NothingToCommit);
            }
            let mut commits = self.commits.lock().unwrap();
            commits.push(message.to_string());
            Ok(CommitOutcome::Committed(format!("{:040x}", commits.len())))
        }
    }
}
