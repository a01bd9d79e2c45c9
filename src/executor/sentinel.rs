//! Completion-marker classification of agent output.
//!
//! This is the only place that looks at agent text. Everything downstream
//! works with [`PhaseOutcome`].

use super::{PhaseKind, PhaseOutcome};

/// The pair of literal markers a phase is told to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentinels {
    pub success: &'static str,
    pub failure: &'static str,
}

impl PhaseKind {
    pub fn sentinels(self) -> Sentinels {
        match self {
            PhaseKind::Dev => Sentinels {
                success: "IMPLEMENTATION COMPLETE",
                failure: "IMPLEMENTATION BLOCKED",
            },
            PhaseKind::Review => Sentinels {
                success: "REVIEW PASSED",
                failure: "REVIEW FAILED",
            },
            PhaseKind::Report => Sentinels {
                success: "REPORT COMPLETE",
                failure: "REPORT FAILED",
            },
        }
    }
}

/// Classify combined agent output. The failure marker wins when both appear.
pub fn classify(output: &str, sentinels: &Sentinels) -> PhaseOutcome {
    if let Some(pos) = output.rfind(sentinels.failure) {
        let rest = &output[pos + sentinels.failure.len()..];
        let reason = rest
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .trim_start_matches([':', '-', '\u{2014}'])
            .trim();
        let reason = if reason.is_empty() {
            "no reason given".to_string()
        } else {
            reason.to_string()
        };
        return PhaseOutcome::Blocked(reason);
    }
    if output.contains(sentinels.success) {
        return PhaseOutcome::Success;
    }
    PhaseOutcome::Unparsed
}
