use super::{CommitOutcome, VersionControl};
use crate::config::STATE_DIR_NAME;
use crate::errors::OrchestratorError;
use git2::{IndexAddOption, Repository, Signature};
use std::path::Path;

pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self, OrchestratorError> {
        let repo = Repository::open(project_dir)?;
        Ok(Self { repo })
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    fn signature(&self) -> Result<Signature<'static>, OrchestratorError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig.to_owned()),
            Err(_) => Ok(Signature::now("storyforge", "storyforge@localhost")?),
        }
    }
}

impl VersionControl for GitTracker {
    fn stage_all(&self) -> Result<(), OrchestratorError> {
        let mut index = self.repo.index()?;
        // Orchestrator state (logs, transcripts, metrics) stays out of commits
        let mut skip_state = |path: &Path, _spec: &[u8]| -> i32 {
            if path.starts_with(STATE_DIR_NAME) { 1 } else { 0 }
        };
        index.add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT,
            Some(&mut skip_state as &mut git2::IndexMatchedPath<'_>),
        )?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<CommitOutcome, OrchestratorError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let parent = self.get_head_commit();

        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            return Ok(CommitOutcome::NothingToCommit);
        }

        let tree = self.repo.find_tree(tree_id)?;
        let sig = self.signature()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        Ok(CommitOutcome::Committed(oid.to_string()))
    }
}
