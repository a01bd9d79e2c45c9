use super::breaker::{BreakerState, CircuitBreaker};
use super::machine::{self, ItemResult};
use super::report::run_report;
use super::verify::{Verification, verify_and_sync};
use crate::config::PipelineContext;
use crate::escalation::{EscalationCounters, Escalator};
use crate::executor::PhaseExecutor;
use crate::metrics::{IssueCategory, IssueEntry, MetricsRecorder, StoryMetrics, StoryOutcome, Totals};
use crate::store::{ItemRecordStore, LedgerStore};
use crate::story::WorkItem;
use crate::story::discovery::Sequence;
use crate::tracker::{CommitOutcome, VersionControl, story_commit_message};
use crate::ui::StoryUI;
use std::path::PathBuf;
use std::sync::Arc;

/// Exit code when every story succeeded.
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code when at least one story exhausted its retries.
pub const EXIT_STORY_FAILED: u8 = 1;
/// Exit code when the circuit breaker halted the run.
pub const EXIT_HALTED: u8 = 2;

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub exit_code: u8,
    pub halted: bool,
    pub totals: Totals,
    pub issue_artifact: Option<PathBuf>,
    pub metrics_file: PathBuf,
    pub report_completed: bool,
    /// Stories that reached a terminal state, in processing order.
    pub processed: Vec<String>,
}

/// Drives a sequenced epic through the story loop, then the report phase.
pub struct EpicRunner<'a> {
    ctx: &'a PipelineContext,
    executor: &'a dyn PhaseExecutor,
    records: &'a dyn ItemRecordStore,
    ledger: &'a dyn LedgerStore,
    vcs: Option<&'a dyn VersionControl>,
    ui: Option<Arc<StoryUI>>,
}

impl<'a> EpicRunner<'a> {
    pub fn new(
        ctx: &'a PipelineContext,
        executor: &'a dyn PhaseExecutor,
        records: &'a dyn ItemRecordStore,
        ledger: &'a dyn LedgerStore,
    ) -> Self {
        Self {
            ctx,
            executor,
            records,
            ledger,
            vcs: None,
            ui: None,
        }
    }

    pub fn with_vcs(mut self, vcs: &'a dyn VersionControl) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn with_ui(mut self, ui: Arc<StoryUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub async fn run(&self, sequence: Sequence) -> RunOutcome {
        let ctx = self.ctx;
        let options = &ctx.options;
        let ui = self.ui.as_deref();
        let mut recorder = MetricsRecorder::start(
            &ctx.metrics_file(),
            &ctx.epic_id,
            options.dry_run,
            sequence.considered,
        );
        let mut breaker = CircuitBreaker::new(options.consecutive_failure_threshold);
        let escalator = Escalator::new(
            &ctx.issues_dir,
            &ctx.epic_id,
            options.skip_review,
            options.no_commit,
        );

        tracing::info!(
            epic = %ctx.epic_id,
            stories = sequence.items.len(),
            skipped = sequence.skipped_done.len(),
            max_retries = options.max_retries,
            threshold = breaker.threshold(),
            dry_run = options.dry_run,
            "epic run started"
        );

        for item in &sequence.skipped_done {
            tracing::info!(story = %item.id, "skipping story already marked done");
            if let Some(ui) = ui {
                ui.story_skipped(item.id.as_str());
            }
            recorder.record_story(StoryMetrics::skipped(item.id.as_str()));
        }

        let mut processed: Vec<WorkItem> = Vec::new();
        let mut halted = false;
        let mut issue_artifact = None;

        for (index, item) in sequence.items.iter().enumerate() {
            if let Some(ui) = ui {
                ui.start_story(item.id.as_str());
            }
            let result = machine::drive(self.executor, &ctx.epic_id, item, options, ui).await;
            processed.push(item.clone());

            if result.succeeded() {
                breaker.record_success();
                let commit = self.commit(item);
                let verification = self.verify(item, &mut recorder);
                recorder.record_story(story_metrics(item, &result, commit, verification));
                tracing::info!(story = %item.id, attempts = result.attempts, "story succeeded");
                if let Some(ui) = ui {
                    ui.story_succeeded(item.id.as_str(), result.attempts);
                }
                continue;
            }

            let tripped = breaker.record_failure() == BreakerState::Tripped;
            let reason = result
                .last_failure
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string());
            tracing::error!(
                story = %item.id,
                attempts = result.attempts,
                consecutive_failures = breaker.consecutive_failures(),
                reason = %reason,
                "story exhausted its retries"
            );
            recorder.record_issue(IssueEntry::new(
                IssueCategory::StoryFailed,
                Some(item.id.as_str()),
                format!("exhausted after {} attempts: {}", result.attempts, reason),
            ));
            recorder.record_story(story_metrics(item, &result, None, None));
            if let Some(ui) = ui {
                ui.story_exhausted(item.id.as_str(), result.attempts);
            }

            if tripped {
                halted = true;
                let consecutive = breaker.consecutive_failures();
                let totals = recorder.totals();
                let narrative = format!(
                    "{} consecutive stories exhausted their retries (threshold {}). \
                     The last failure on story {} was: {}. Repeated failures across \
                     different stories usually point at a broken environment rather \
                     than at the stories themselves.",
                    consecutive,
                    breaker.threshold(),
                    item.id,
                    reason
                );
                let counters = EscalationCounters {
                    consecutive_failures: consecutive,
                    completed: totals.completed,
                    failed: totals.failed,
                    skipped: totals.skipped,
                    not_attempted: sequence.items.len() - index - 1,
                };
                recorder.record_issue(IssueEntry::new(
                    IssueCategory::ConsecutiveFailures,
                    Some(item.id.as_str()),
                    format!("circuit breaker tripped after {} consecutive failures", consecutive),
                ));
                match escalator.escalate(
                    IssueCategory::ConsecutiveFailures,
                    item.id.as_str(),
                    &narrative,
                    counters,
                ) {
                    Ok(artifact) => issue_artifact = Some(artifact.path),
                    Err(e) => tracing::error!(
                        error = %format!("{:#}", e),
                        "failed to write issue artifact"
                    ),
                }
                tracing::error!(
                    epic = %ctx.epic_id,
                    consecutive_failures = consecutive,
                    "circuit breaker tripped, halting epic"
                );
                if let Some(ui) = ui {
                    ui.halted(consecutive);
                }
                break;
            }
        }

        let report_completed =
            run_report(self.executor, &ctx.epic_id, &processed, ui).await;

        let record = recorder.finalize(halted);
        let totals = record.totals;
        let exit_code = if halted {
            EXIT_HALTED
        } else if totals.failed > 0 {
            EXIT_STORY_FAILED
        } else {
            EXIT_SUCCESS
        };

        tracing::info!(
            epic = %ctx.epic_id,
            completed = totals.completed,
            failed = totals.failed,
            skipped = totals.skipped,
            halted,
            exit_code,
            "epic run finished"
        );

        RunOutcome {
            exit_code,
            halted,
            totals,
            issue_artifact,
            metrics_file: recorder.path().to_path_buf(),
            report_completed,
            processed: processed.iter().map(|i| i.id.to_string()).collect(),
        }
    }

    /// Stage and commit the story's changes. Every failure here is a warning.
    fn commit(&self, item: &WorkItem) -> Option<String> {
        if self.ctx.options.dry_run {
            tracing::info!(story = %item.id, "dry run, commit skipped");
            return None;
        }
        let vcs = self.vcs?;
        if let Err(e) = vcs.stage_all() {
            tracing::warn!(story = %item.id, error = %e, "failed to stage changes");
            return None;
        }
        if self.ctx.options.no_commit {
            tracing::info!(story = %item.id, "changes staged, commit disabled");
            return None;
        }
        let message = story_commit_message(&self.ctx.epic_id, item.id.as_str());
        match vcs.commit(&message) {
            Ok(CommitOutcome::Committed(sha)) => {
                tracing::info!(story = %item.id, sha = %sha, "story committed");
                if let Some(ui) = self.ui.as_deref() {
                    ui.committed(item.id.as_str(), &sha[..sha.len().min(8)]);
                }
                Some(sha)
            }
            Ok(CommitOutcome::NothingToCommit) => {
                tracing::warn!(story = %item.id, "nothing to commit");
                None
            }
            Err(e) => {
                tracing::warn!(story = %item.id, error = %e, "commit failed");
                None
            }
        }
    }

    /// Sync the ledger and reconcile. Disagreement is recorded, never fatal.
    fn verify(&self, item: &WorkItem, recorder: &mut MetricsRecorder) -> Option<String> {
        if self.ctx.options.dry_run {
            return None;
        }
        let message = match verify_and_sync(item, self.records, self.ledger) {
            Ok(Verification::Confirmed) => {
                tracing::info!(story = %item.id, "story verified in record and ledger");
                return Some(Verification::Confirmed.as_str().to_string());
            }
            Ok(mismatch) => mismatch.describe(),
            Err(e) => format!("verification could not complete: {}", e),
        };
        tracing::warn!(story = %item.id, detail = %message, "dual-source verification failed");
        if let Some(ui) = self.ui.as_deref() {
            ui.warning(&format!("{}: {}", item.id, message));
        }
        recorder.record_issue(IssueEntry::new(
            IssueCategory::VerificationFailed,
            Some(item.id.as_str()),
            message,
        ));
        Some("mismatch".to_string())
    }
}

fn story_metrics(
    item: &WorkItem,
    result: &ItemResult,
    commit: Option<String>,
    verification: Option<String>,
) -> StoryMetrics {
    StoryMetrics {
        id: item.id.to_string(),
        outcome: if result.succeeded() {
            StoryOutcome::Completed
        } else {
            StoryOutcome::Failed
        },
        attempts: result.attempts,
        duration_secs: result.duration.as_secs_f64(),
        commit,
        verification,
    }
}
