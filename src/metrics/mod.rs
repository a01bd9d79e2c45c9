//! Per-epic run metrics.

pub mod recorder;

pub use recorder::MetricsRecorder;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub run_id: Uuid,
    pub epic_id: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub totals: Totals,
    #[serde(default)]
    pub stories: Vec<StoryMetrics>,
    #[serde(default)]
    pub issues: Vec<IssueEntry>,
    #[serde(default)]
    pub halted: bool,
    /// Incremental updates were abandoned and the file was rewritten at finalize.
    #[serde(default)]
    pub degraded: bool,
}

impl MetricsRecord {
    pub fn new(epic_id: &str, dry_run: bool, total: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            epic_id: epic_id.to_string(),
            dry_run,
            started_at: Utc::now(),
            ended_at: None,
            duration_secs: None,
            totals: Totals {
                total,
                ..Totals::default()
            },
            stories: Vec::new(),
            issues: Vec::new(),
            halted: false,
            degraded: false,
        }
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        self.duration_secs = Some((now - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.ended_at = Some(now);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryOutcome {
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryMetrics {
    pub id: String,
    pub outcome: StoryOutcome,
    pub attempts: u32,
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<String>,
}

impl StoryMetrics {
    pub fn skipped(id: &str) -> Self {
        Self {
            id: id.to_string(),
            outcome: StoryOutcome::Skipped,
            attempts: 0,
            duration_secs: 0.0,
            commit: None,
            verification: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    StoryFailed,
    VerificationFailed,
    ConsecutiveFailures,
    Degradation,
}

impl IssueCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCategory::StoryFailed => "story_failed",
            IssueCategory::VerificationFailed => "verification_failed",
            IssueCategory::ConsecutiveFailures => "consecutive_failures",
            IssueCategory::Degradation => "degradation",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueEntry {
    pub category: IssueCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl IssueEntry {
    pub fn new(category: IssueCategory, story: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            category,
            story: story.map(str::to_string),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_yaml_shape() {
        let mut record = MetricsRecord::new("3", false, 2);
        record.stories.push(StoryMetrics {
            id: "3-1".into(),
            outcome: StoryOutcome::Completed,
            attempts: 1,
            duration_secs: 1.5,
            commit: Some("abc123".into()),
            verification: Some("confirmed".into()),
        });
        record.issues.push(IssueEntry::new(
            IssueCategory::VerificationFailed,
            Some("3-2"),
            "ledger disagrees",
        ));
        record.finish();

        let yaml = serde_yaml::to_string(&record).unwrap();
        assert!(yaml.contains("epic_id: '3'"));
        assert!(yaml.contains("outcome: completed"));
        assert!(yaml.contains("category: verification_failed"));
        assert!(yaml.contains("commit: abc123"));

        let back: MetricsRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.run_id, record.run_id);
        assert_eq!(back.totals.total, 2);
        assert!(back.ended_at.is_some());
    }

    #[test]
    fn test_skipped_story_has_no_attempts() {
        let s = StoryMetrics::skipped("3-4");
        assert_eq!(s.outcome, StoryOutcome::Skipped);
        assert_eq!(s.attempts, 0);
        let yaml = serde_yaml::to_string(&s).unwrap();
        assert!(!yaml.contains("commit"));
    }
}
