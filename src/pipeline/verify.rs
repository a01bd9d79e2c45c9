//! Reconciliation of a story's own record against the aggregate ledger.

use crate::errors::StoreError;
use crate::store::{ItemRecordStore, LedgerStore};
use crate::story::{StoryStatus, WorkItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Both sources report the story done.
    Confirmed,
    Mismatch { record_done: bool, ledger_done: bool },
}

impl Verification {
    pub fn as_str(self) -> &'static str {
        match self {
            Verification::Confirmed => "confirmed",
            Verification::Mismatch { .. } => "mismatch",
        }
    }

    pub fn describe(self) -> String {
        match self {
            Verification::Confirmed => "story record and ledger both report done".to_string(),
            Verification::Mismatch {
                record_done,
                ledger_done,
            } => format!(
                "story record says {}, ledger says {}",
                done_word(record_done),
                done_word(ledger_done)
            ),
        }
    }
}

fn done_word(done: bool) -> &'static str {
    if done { "done" } else { "not done" }
}

/// Side-effect-free agreement check.
pub fn reconcile(record_done: bool, ledger_done: bool) -> Verification {
    if record_done && ledger_done {
        Verification::Confirmed
    } else {
        Verification::Mismatch {
            record_done,
            ledger_done,
        }
    }
}

/// Mark the story done in the ledger, then re-read both sources.
pub fn verify_and_sync(
    item: &WorkItem,
    records: &dyn ItemRecordStore,
    ledger: &dyn LedgerStore,
) -> Result<Verification, StoreError> {
    ledger.upsert(&item.id, &StoryStatus::Done)?;

    let record_done = records.status(item)?.is_some_and(|s| s.is_done());
    let ledger_done = ledger.status(&item.id)?.is_some_and(|s| s.is_done());
    Ok(reconcile(record_done, ledger_done))
}
