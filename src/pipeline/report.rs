use crate::executor::{PhaseExecutor, PhaseKind, PhaseOutcome, PhaseRequest};
use crate::story::WorkItem;
use crate::ui::StoryUI;

/// Run the aggregate report phase over every processed story.
///
/// Returns whether the report completed. A failed report is only logged; it
/// never affects the run's exit code.
pub async fn run_report(
    executor: &dyn PhaseExecutor,
    epic_id: &str,
    processed: &[WorkItem],
    ui: Option<&StoryUI>,
) -> bool {
    let inputs = processed
        .iter()
        .filter_map(|item| item.primary_location().map(|p| p.to_path_buf()))
        .collect();
    let request = PhaseRequest::for_report(epic_id, inputs);

    if let Some(ui) = ui {
        ui.start_phase(PhaseKind::Report, 1, 1);
    }
    tracing::info!(epic = %epic_id, stories = processed.len(), "report phase started");

    let outcome = match executor.execute(&request).await {
        Ok(outcome) => outcome,
        Err(e) => PhaseOutcome::Blocked(e.to_string()),
    };
    match outcome.failure_reason() {
        None => {
            tracing::info!(epic = %epic_id, "report phase complete");
            true
        }
        Some(reason) => {
            tracing::warn!(epic = %epic_id, reason = %reason, "report phase failed; run outcome unchanged");
            if let Some(ui) = ui {
                ui.warning(&format!("Epic report failed: {}", reason));
            }
            false
        }
    }
}
