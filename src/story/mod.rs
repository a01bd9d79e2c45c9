//! Work items ("stories") and their deterministic ordering.
//!
//! A story is identified by a dotted/dashed version-like id such as `3-1` or
//! `3-10`. Ids compare by their numeric segments, so `3-2` sorts before
//! `3-10`, which plain string ordering would get wrong.

pub mod discovery;

pub use discovery::{Sequencer, SequencerOptions};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a single story, e.g. `3-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoryId(String);

impl StoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric segments of the id, used for version ordering.
    ///
    /// Non-numeric segments are skipped, so `story-3-1` yields `[3, 1]`.
    pub fn version_key(&self) -> Vec<u64> {
        self.0
            .split(|c: char| c == '-' || c == '.' || c == '_')
            .filter_map(|seg| seg.parse::<u64>().ok())
            .collect()
    }

    /// Version ordering with a lexical tie-break so the order is total.
    pub fn version_cmp(&self, other: &Self) -> Ordering {
        self.version_key()
            .cmp(&other.version_key())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One schedulable story belonging to an epic.
///
/// A story may be found at more than one location (for example both
/// `3-1-login.md` and `story-3-1.md` in different story directories); all of
/// them are kept in the order they were added, and the first is the primary
/// record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: StoryId,
    pub locations: Vec<PathBuf>,
}

impl WorkItem {
    pub fn new(id: impl Into<StoryId>, location: PathBuf) -> Self {
        Self {
            id: id.into(),
            locations: vec![location],
        }
    }

    /// The record the agent is pointed at and that the record store reads.
    pub fn primary_location(&self) -> Option<&Path> {
        self.locations.first().map(PathBuf::as_path)
    }

    /// Append a lower-priority location; duplicates keep their first position.
    pub fn add_location(&mut self, location: PathBuf) {
        if !self.locations.contains(&location) {
            self.locations.push(location);
        }
    }
}

impl From<String> for StoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Lifecycle status as written in an item record or the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryStatus {
    Backlog,
    ReadyForDev,
    InProgress,
    Review,
    Done,
    Other(String),
}

impl StoryStatus {
    /// Parse a free-form status value. Unknown values are kept verbatim.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw
            .trim()
            .trim_matches(|c: char| c == '*' || c == '`' || c == '"' || c == '\'')
            .to_lowercase()
            .replace(['_', ' '], "-");
        match normalized.as_str() {
            "done" | "complete" | "completed" => StoryStatus::Done,
            "backlog" | "draft" => StoryStatus::Backlog,
            "ready-for-dev" | "ready" | "approved" => StoryStatus::ReadyForDev,
            "in-progress" => StoryStatus::InProgress,
            "review" | "in-review" => StoryStatus::Review,
            _ => StoryStatus::Other(raw.trim().to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StoryStatus::Done)
    }
}

impl fmt::Display for StoryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoryStatus::Backlog => write!(f, "backlog"),
            StoryStatus::ReadyForDev => write!(f, "ready-for-dev"),
            StoryStatus::InProgress => write!(f, "in-progress"),
            StoryStatus::Review => write!(f, "review"),
            StoryStatus::Done => write!(f, "done"),
            StoryStatus::Other(s) => write!(f, "{}", s),
        }
    }
}
