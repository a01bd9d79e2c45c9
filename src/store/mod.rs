//! The two independent status views of a story.
//!
//! - [`ItemRecordStore`] reads a story's own record (the story markdown file).
//! - [`LedgerStore`] reads and writes the aggregate, cross-story status ledger.
//!
//! The pipeline never assumes the two agree; reconciliation happens in
//! [`crate::pipeline::verify`].

pub mod ledger;
pub mod markdown;
#[cfg(test)]
pub mod memory;

pub use ledger::YamlLedger;
pub use markdown::MarkdownRecordStore;

use crate::errors::StoreError;
use crate::story::{StoryId, StoryStatus, WorkItem};

/// Read access to a story's own record.
pub trait ItemRecordStore: Send + Sync {
    /// Status embedded in the record, `None` if the record carries no status.
    fn status(&self, item: &WorkItem) -> Result<Option<StoryStatus>, StoreError>;
}

/// The aggregate ledger, one entry per story keyed by id.
pub trait LedgerStore: Send + Sync {
    fn status(&self, id: &StoryId) -> Result<Option<StoryStatus>, StoreError>;

    /// Insert or update the entry for `id`. Applying the same update twice
    /// leaves the ledger identical to applying it once.
    fn upsert(&self, id: &StoryId, status: &StoryStatus) -> Result<(), StoreError>;
}

/// True when a ledger key belongs to the story: exact id, or a slugged key
/// such as `3-1-user-login` for story `3-1`.
pub fn ledger_key_matches(key: &str, id: &StoryId) -> bool {
    key == id.as_str()
        || key
            .strip_prefix(id.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_key_matches_exact_and_slugged() {
        let id = StoryId::from("3-1");
        assert!(ledger_key_matches("3-1", &id));
        assert!(ledger_key_matches("3-1-user-login", &id));
        assert!(!ledger_key_matches("3-10", &id));
        assert!(!ledger_key_matches("3-10-search", &id));
        assert!(!ledger_key_matches("13-1", &id));
    }
}
