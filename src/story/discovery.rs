//! Story discovery and sequencing for an epic.
//!
//! Discovery runs several independent matching strategies over the story
//! directories and unions their results by story id:
//!
//! | Strategy            | Matches                                     |
//! |---------------------|---------------------------------------------|
//! | `PrefixedFilename`  | `story-3-1.md`, `story-3.1-login.md`        |
//! | `BareFilename`      | `3-1-login.md`, `3.1.story.md`              |
//! | `ContentReference`  | any `.md` whose body names the epic         |
//!
//! A file matched by more than one strategy, or two files that resolve to the
//! same id, collapse into a single [`WorkItem`] with several locations. The
//! strategies are listed in priority order: the primary location of a story
//! comes from the highest-priority strategy that found it.

use super::{StoryId, WorkItem};
use crate::errors::DiscoveryError;
use crate::store::{ItemRecordStore, LedgerStore};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filters applied after discovery, in this order: cursor, then already-done.
#[derive(Debug, Clone, Default)]
pub struct SequencerOptions {
    pub start_from: Option<String>,
    pub skip_done: bool,
}

/// Result of sequencing: the stories to run and the ones filtered out as done.
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    /// Stories remaining after the resume cursor (before the done filter).
    pub considered: usize,
    pub items: Vec<WorkItem>,
    pub skipped_done: Vec<WorkItem>,
}

/// Declaration order is match priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Strategy {
    PrefixedFilename,
    BareFilename,
    ContentReference,
}

pub struct Sequencer {
    epic_id: String,
    story_dirs: Vec<PathBuf>,
    prefixed: Regex,
    bare: Regex,
    epic_reference: Regex,
    id_in_name: Regex,
    id_in_title: Regex,
}

impl Sequencer {
    pub fn new(epic_id: &str, story_dirs: Vec<PathBuf>) -> Result<Self, DiscoveryError> {
        if epic_id.is_empty()
            || !epic_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(DiscoveryError::InvalidEpicId(epic_id.to_string()));
        }
        let epic = regex::escape(epic_id);
        let build = |pattern: String| {
            Regex::new(&pattern).map_err(|_| DiscoveryError::InvalidEpicId(epic_id.to_string()))
        };

        Ok(Self {
            epic_id: epic_id.to_string(),
            story_dirs,
            prefixed: build(format!(r"(?i)^story[-_.]?{epic}[-.](\d+)(?:[-_.].*)?$"))?,
            bare: build(format!(r"(?i)^{epic}[-.](\d+)(?:[-_.].*)?$"))?,
            epic_reference: build(format!(
                r"(?im)^\s*(?:[-*]\s+)?(?:\*\*)?epic(?:\*\*)?\s*(?::|#)?\s*(?:\*\*)?\s*(?:epic[-\s]?)?{epic}\b"
            ))?,
            id_in_name: build(format!(r"(?i)(?:^|[^0-9A-Za-z]){epic}[-.](\d+)(?:[^0-9]|$)"))?,
            id_in_title: build(format!(r"(?im)^#+\s*story\s+{epic}[.\-](\d+)\b"))?,
        })
    }


    /// Discover, deduplicate and version-sort the epic's stories.
    ///
    /// An empty result is a fatal configuration error.
    pub fn discover(&self) -> Result<Vec<WorkItem>, DiscoveryError> {
        let mut hits: Vec<(Strategy, PathBuf, StoryId)> = Vec::new();
        for path in self.candidate_files() {
            for strategy in [
                Strategy::PrefixedFilename,
                Strategy::BareFilename,
                Strategy::ContentReference,
            ] {
                if let Some(id) = self.apply_strategy(strategy, &path) {
                    debug!(story = %id, path = %path.display(), ?strategy, "matched story");
                    hits.push((strategy, path.clone(), id));
                }
            }
        }

        // Filename hits outrank content-only references, so the primary
        // record is always a story file when one exists.
        hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let mut by_id: BTreeMap<String, WorkItem> = BTreeMap::new();
        for (_, path, id) in hits {
            by_id
                .entry(id.as_str().to_string())
                .and_modify(|item| item.add_location(path.clone()))
                .or_insert_with(|| WorkItem::new(id, path));
        }

        if by_id.is_empty() {
            return Err(DiscoveryError::NoStories {
                epic_id: self.epic_id.clone(),
                searched: self.story_dirs.clone(),
            });
        }

        let mut items: Vec<WorkItem> = by_id.into_values().collect();
        items.sort_by(|a, b| a.id.version_cmp(&b.id));
        Ok(items)
    }

    /// Full sequencing: discovery, then the resume cursor, then the done filter.
    pub fn sequence(
        &self,
        options: &SequencerOptions,
        records: &dyn ItemRecordStore,
        ledger: &dyn LedgerStore,
    ) -> Result<Sequence, DiscoveryError> {
        let discovered = self.discover()?;
        let items = match options.start_from.as_deref() {
            Some(cursor) => apply_cursor(discovered, cursor)?,
            None => discovered,
        };
        let considered = items.len();

        let (items, skipped_done) = if options.skip_done {
            filter_done(items, records, ledger)
        } else {
            (items, Vec::new())
        };

        Ok(Sequence {
            considered,
            items,
            skipped_done,
        })
    }

    fn candidate_files(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for dir in &self.story_dirs {
            if !dir.is_dir() {
                debug!(dir = %dir.display(), "story directory does not exist, skipping");
                continue;
            }
            files.extend(
                WalkDir::new(dir)
                    .follow_links(true)
                    .into_iter()
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().is_file())
                    .map(|e| e.into_path())
                    .filter(|p| p.extension().is_some_and(|ext| ext == "md")),
            );
        }
        files.sort();
        files.dedup();
        files
    }

    fn apply_strategy(&self, strategy: Strategy, path: &Path) -> Option<StoryId> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();

        let number = match strategy {
            Strategy::PrefixedFilename => capture_number(&self.prefixed, stem),
            Strategy::BareFilename => capture_number(&self.bare, stem),
            Strategy::ContentReference => {
                let content = match std::fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable markdown file");
                        return None;
                    }
                };
                if !self.epic_reference.is_match(&content) {
                    return None;
                }
                let number = capture_number(&self.id_in_name, stem)
                    .or_else(|| capture_number(&self.id_in_title, &content));
                if number.is_none() {
                    debug!(
                        path = %path.display(),
                        "file references the epic but carries no story number"
                    );
                }
                number
            }
        };

        number.map(|n| StoryId::new(format!("{}-{}", self.epic_id, n)))
    }
}

fn capture_number(regex: &Regex, haystack: &str) -> Option<u64> {
    regex
        .captures(haystack)
        .and_then(|cap| cap.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Drop every story before the first one whose id contains `cursor`.
pub fn apply_cursor(items: Vec<WorkItem>, cursor: &str) -> Result<Vec<WorkItem>, DiscoveryError> {
    let available = items.len();
    let Some(start) = items.iter().position(|i| i.id.as_str().contains(cursor)) else {
        return Err(DiscoveryError::CursorNotFound {
            cursor: cursor.to_string(),
            available,
        });
    };
    Ok(items.into_iter().skip(start).collect())
}

/// Split into (to run, already done). A story is done if either its own
/// record or the ledger says so. Unreadable sources count as not done.
pub fn filter_done(
    items: Vec<WorkItem>,
    records: &dyn ItemRecordStore,
    ledger: &dyn LedgerStore,
) -> (Vec<WorkItem>, Vec<WorkItem>) {
    items.into_iter().partition(|item| {
        let record_done = records
            .status(item)
            .inspect_err(|e| warn!(story = %item.id, error = %e, "could not read story record"))
            .ok()
            .flatten()
            .is_some_and(|s| s.is_done());
        let ledger_done = ledger
            .status(&item.id)
            .inspect_err(|e| warn!(story = %item.id, error = %e, "could not read ledger"))
            .ok()
            .flatten()
            .is_some_and(|s| s.is_done());
        if record_done || ledger_done {
            debug!(story = %item.id, record_done, ledger_done, "skipping done story");
        }
        !(record_done || ledger_done)
    })
}
