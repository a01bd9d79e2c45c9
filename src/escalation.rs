//! Write-once diagnostic artifacts for halted runs.

use crate::metrics::IssueCategory;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Counters describing where the run stood when it was escalated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EscalationCounters {
    pub consecutive_failures: u32,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Stories in the sequence that were never attempted.
    pub not_attempted: usize,
}

#[derive(Debug, Clone)]
pub struct IssueArtifact {
    pub category: IssueCategory,
    pub epic_id: String,
    pub story_id: String,
    pub narrative: String,
    pub counters: EscalationCounters,
    pub resume_command: String,
    pub created_at: DateTime<Utc>,
    pub path: PathBuf,
}

impl IssueArtifact {
    pub fn to_markdown(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "# Epic {} halted: {}",
            self.epic_id, self.category
        ));
        lines.push(String::new());
        lines.push(format!("> Category: `{}`", self.category));
        lines.push(format!("> Triggering story: `{}`", self.story_id));
        lines.push(format!("> Created at: {}", self.created_at.to_rfc3339()));
        lines.push(String::new());

        lines.push("## What happened".to_string());
        lines.push(String::new());
        lines.push(self.narrative.clone());
        lines.push(String::new());

        lines.push("## Run state".to_string());
        lines.push(String::new());
        lines.push("| Counter | Value |".to_string());
        lines.push("|---------|-------|".to_string());
        let c = &self.counters;
        lines.push(format!("| Consecutive failures | {} |", c.consecutive_failures));
        lines.push(format!("| Completed before halt | {} |", c.completed));
        lines.push(format!("| Failed | {} |", c.failed));
        lines.push(format!("| Skipped (already done) | {} |", c.skipped));
        lines.push(format!("| Not attempted | {} |", c.not_attempted));
        lines.push(String::new());

        lines.push("## Resume".to_string());
        lines.push(String::new());
        lines.push(
            "Fix the underlying cause (test environment, dependencies, story definition), then run:"
                .to_string(),
        );
        lines.push(String::new());
        lines.push("```bash".to_string());
        lines.push(self.resume_command.clone());
        lines.push("```".to_string());
        lines.push(String::new());

        lines.join("\n")
    }
}

/// Produces issue artifacts under the run's issues directory.
pub struct Escalator {
    issues_dir: PathBuf,
    epic_id: String,
    skip_review: bool,
    no_commit: bool,
}

impl Escalator {
    pub fn new(issues_dir: &Path, epic_id: &str, skip_review: bool, no_commit: bool) -> Self {
        Self {
            issues_dir: issues_dir.to_path_buf(),
            epic_id: epic_id.to_string(),
            skip_review,
            no_commit,
        }
    }

    /// The literal command that resumes the epic at `story_id`.
    pub fn resume_command(&self, story_id: &str) -> String {
        let mut cmd = format!(
            "storyforge run {} --start-from {} --skip-done",
            self.epic_id, story_id
        );
        if self.skip_review {
            cmd.push_str(" --skip-review");
        }
        if self.no_commit {
            cmd.push_str(" --no-commit");
        }
        cmd
    }

    /// Write the artifact. An existing file is never overwritten.
    pub fn escalate(
        &self,
        category: IssueCategory,
        story_id: &str,
        narrative: &str,
        counters: EscalationCounters,
    ) -> Result<IssueArtifact> {
        std::fs::create_dir_all(&self.issues_dir)
            .with_context(|| format!("Failed to create {}", self.issues_dir.display()))?;

        let created_at = Utc::now();
        let mut artifact = IssueArtifact {
            category,
            epic_id: self.epic_id.clone(),
            story_id: story_id.to_string(),
            narrative: narrative.to_string(),
            counters,
            resume_command: self.resume_command(story_id),
            created_at,
            path: PathBuf::new(),
        };
        let content = artifact.to_markdown();

        let stem = format!(
            "epic-{}-{}-{}",
            self.epic_id,
            category,
            created_at.format("%Y%m%d-%H%M%S")
        );
        for n in 0..100 {
            let name = if n == 0 {
                format!("{}.md", stem)
            } else {
                format!("{}-{}.md", stem, n)
            };
            let path = self.issues_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::warn!(
                        epic = %self.epic_id,
                        story = %story_id,
                        category = %category,
                        path = %path.display(),
                        "issue artifact written"
                    );
                    artifact.path = path;
                    return Ok(artifact);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }
        anyhow::bail!(
            "Could not find a free issue artifact name for {} in {}",
            stem,
            self.issues_dir.display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn counters() -> EscalationCounters {
        EscalationCounters {
            consecutive_failures: 3,
            completed: 1,
            failed: 3,
            skipped: 0,
            not_attempted: 2,
        }
    }

    #[test]
    fn test_resume_command_carries_run_flags() {
        let dir = tempdir().unwrap();
        let plain = Escalator::new(dir.path(), "3", false, false);
        assert_eq!(
            plain.resume_command("3-4"),
            "storyforge run 3 --start-from 3-4 --skip-done"
        );
        let flagged = Escalator::new(dir.path(), "3", true, true);
        assert_eq!(
            flagged.resume_command("3-4"),
            "storyforge run 3 --start-from 3-4 --skip-done --skip-review --no-commit"
        );
    }

    #[test]
    fn test_escalate_writes_markdown() {
        let dir = tempdir().unwrap();
        let esc = Escalator::new(&dir.path().join("issues"), "3", false, false);
        let artifact = esc
            .escalate(
                IssueCategory::ConsecutiveFailures,
                "3-4",
                "Three stories in a row exhausted their retries.",
                counters(),
            )
            .unwrap();

        let name = artifact.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("epic-3-consecutive_failures-"));
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        assert!(content.contains("# Epic 3 halted: consecutive_failures"));
        assert!(content.contains("Triggering story: `3-4`"));
        assert!(content.contains("| Consecutive failures | 3 |"));
        assert!(content.contains("| Not attempted | 2 |"));
        assert!(content.contains("storyforge run 3 --start-from 3-4 --skip-done"));
    }

    #[test]
    fn test_escalate_never_overwrites() {
        let dir = tempdir().unwrap();
        let esc = Escalator::new(dir.path(), "3", false, false);
        let a = esc
            .escalate(IssueCategory::ConsecutiveFailures, "3-1", "first", counters())
            .unwrap();
        let b = esc
            .escalate(IssueCategory::ConsecutiveFailures, "3-2", "second", counters())
            .unwrap();
        assert_ne!(a.path, b.path);
        assert!(std::fs::read_to_string(&a.path).unwrap().contains("first"));
        assert!(std::fs::read_to_string(&b.path).unwrap().contains("second"));
    }
}
