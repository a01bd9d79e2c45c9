use super::ItemRecordStore;
use crate::errors::StoreError;
use crate::story::{StoryStatus, WorkItem};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

// `Status: done`, `**Status:** done`, `- Status: done`
static STATUS_LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(?:[-*]\s+)?(?:\*\*)?status(?:\*\*)?\s*:\s*(?:\*\*)?\s*(\S.*?)\s*$")
        .unwrap()
});

// `## Status` heading; the value is the next non-empty line
static STATUS_HEADING_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^#{1,6}\s*status\s*$").unwrap());

/// Item records stored as markdown story files.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRecordStore;

impl MarkdownRecordStore {
    pub fn new() -> Self {
        Self
    }

    fn read(path: &Path) -> Result<String, StoreError> {
        std::fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Extract the status value from a story document.
pub fn parse_status(content: &str) -> Option<StoryStatus> {
    if let Some(cap) = STATUS_LINE_REGEX.captures(content)
        && let Some(value) = cap.get(1)
    {
        return Some(StoryStatus::parse(value.as_str()));
    }

    let heading = STATUS_HEADING_REGEX.find(content)?;
    content[heading.end()..]
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .map(StoryStatus::parse)
}

impl ItemRecordStore for MarkdownRecordStore {
    fn status(&self, item: &WorkItem) -> Result<Option<StoryStatus>, StoreError> {
        let path = item
            .primary_location()
            .ok_or_else(|| StoreError::MissingRecord(item.id.to_string()))?;
        let content = Self::read(path)?;
        Ok(parse_status(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_status_plain_line() {
        let doc = "# Story 3.1: Login\n\nStatus: Done\n\n## Tasks\n";
        assert_eq!(parse_status(doc), Some(StoryStatus::Done));
    }

    #[test]
    fn test_parse_status_bold_line() {
        let doc = "# Story\n**Status:** in-progress\n";
        assert_eq!(parse_status(doc), Some(StoryStatus::InProgress));
    }

    #[test]
    fn test_parse_status_heading_form() {
        let doc = "# Story 3.2\n\n## Status\n\nReview\n\n## Acceptance Criteria\n";
        assert_eq!(parse_status(doc), Some(StoryStatus::Review));
    }

    #[test]
    fn test_parse_status_heading_without_value() {
        let doc = "## Status\n\n## Tasks\n- one\n";
        assert_eq!(parse_status(doc), None);
    }

    #[test]
    fn test_parse_status_missing() {
        assert_eq!(parse_status("# Story\nNo status here\n"), None);
    }

    #[test]
    fn test_store_reads_primary_location() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("3-1-login.md");
        fs::write(&path, "# Story 3.1\nStatus: done\n").unwrap();
        let item = WorkItem::new("3-1", path);
        let store = MarkdownRecordStore::new();
        assert_eq!(store.status(&item).unwrap(), Some(StoryStatus::Done));
    }

    #[test]
    fn test_store_missing_file_is_read_error() {
        let dir = tempdir().unwrap();
        let item = WorkItem::new("3-1", dir.path().join("gone.md"));
        let err = MarkdownRecordStore::new().status(&item).unwrap_err();
        assert!(matches!(err, StoreError::Read { .. }));
    }
}
