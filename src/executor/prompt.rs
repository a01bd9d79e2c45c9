//! Self-contained instruction payloads, one per phase kind.
//!
//! Each payload names the file to operate on and the exact markers the agent
//! must print, so a fresh agent process needs no other context.

use super::{PhaseKind, PhaseRequest};

pub fn build_prompt(request: &PhaseRequest) -> String {
    let sentinels = request.kind.sentinels();
    let task = match request.kind {
        PhaseKind::Dev => dev_task(request),
        PhaseKind::Review => review_task(request),
        PhaseKind::Report => report_task(request),
    };

    let retry_section = match &request.previous_failure {
        Some(reason) => format!(
            r#"## PREVIOUS ATTEMPT
This is attempt {}. The previous attempt did not complete: {}
Start from the current state of the working tree and address that cause first.

"#,
            request.attempt, reason
        ),
        None => String::new(),
    };

    format!(
        r#"{task}
{retry_section}## CRITICAL RULES
1. Work only on what is described above
2. Check existing code before making changes
3. Run the project's tests/checks to verify your work
4. Do NOT commit; the orchestrator handles version control
5. Only output {success} when the task is FULLY complete and verified
6. If you cannot complete the task, output {failure}: <one-line reason>

When complete, output exactly:
{success}"#,
        success = sentinels.success,
        failure = sentinels.failure,
    )
}

fn story_record(request: &PhaseRequest) -> (String, String) {
    match &request.story {
        Some(story) => (story.id.to_string(), story.record.display().to_string()),
        None => ("<unknown>".to_string(), "<missing story record>".to_string()),
    }
}

fn dev_task(request: &PhaseRequest) -> String {
    let (id, record) = story_record(request);
    format!(
        r#"## TASK
Implement story {id} of epic {epic}.

The story file is: {record}

Read the story file, implement every task and acceptance criterion, write or
update tests, and keep the story file's task checklist and Status line current.
When every task is done and all tests pass, set the story Status to done.
"#,
        epic = request.epic_id,
    )
}

fn review_task(request: &PhaseRequest) -> String {
    let (id, record) = story_record(request);
    format!(
        r#"## TASK
Review the implementation of story {id} of epic {epic}.

The story file is: {record}

Check the uncommitted changes in the working tree against the story's
acceptance criteria. Run the tests. Fix small issues directly. If the
implementation does not satisfy the story, explain what is missing.
"#,
        epic = request.epic_id,
    )
}

fn report_task(request: &PhaseRequest) -> String {
    let inputs = if request.inputs.is_empty() {
        "- (no stories were processed)".to_string()
    } else {
        request
            .inputs
            .iter()
            .map(|p| format!("- {}", p.display()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        r#"## TASK
Write the completion report for epic {epic}.

Story files processed in this run:
{inputs}

Read each story file and summarize what was delivered, what failed, and any
follow-up work, as a single markdown document next to the story files named
epic-{epic}-report.md.
"#,
        epic = request.epic_id,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::PhaseRequest;
    use crate::story::WorkItem;
    use std::path::PathBuf;

    fn item() -> WorkItem {
        WorkItem::new("3-1", PathBuf::from("/repo/docs/stories/3-1-login.md"))
    }

    #[test]
    fn test_dev_prompt_names_file_and_markers() {
        let req = PhaseRequest::for_story(PhaseKind::Dev, "3", &item(), 1, None);
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Implement story 3-1 of epic 3"));
        assert!(prompt.contains("/repo/docs/stories/3-1-login.md"));
        assert!(prompt.contains("IMPLEMENTATION COMPLETE"));
        assert!(prompt.contains("IMPLEMENTATION BLOCKED: <one-line reason>"));
        assert!(!prompt.contains("## PREVIOUS ATTEMPT"));
    }

    #[test]
    fn test_retry_prompt_includes_previous_failure() {
        let req = PhaseRequest::for_story(
            PhaseKind::Dev,
            "3",
            &item(),
            2,
            Some("review failed: missing tests".to_string()),
        );
        let prompt = build_prompt(&req);
        assert!(prompt.contains("This is attempt 2"));
        assert!(prompt.contains("review failed: missing tests"));
    }

    #[test]
    fn test_review_prompt_uses_review_markers() {
        let req = PhaseRequest::for_story(PhaseKind::Review, "3", &item(), 1, None);
        let prompt = build_prompt(&req);
        assert!(prompt.contains("Review the implementation of story 3-1"));
        assert!(prompt.contains("REVIEW PASSED"));
        assert!(!prompt.contains("IMPLEMENTATION COMPLETE"));
    }

    #[test]
    fn test_report_prompt_lists_inputs() {
        let req = PhaseRequest::for_report(
            "3",
            vec![PathBuf::from("a/3-1.md"), PathBuf::from("a/3-2.md")],
        );
        let prompt = build_prompt(&req);
        assert!(prompt.contains("- a/3-1.md\n- a/3-2.md"));
        assert!(prompt.contains("epic-3-report.md"));
        assert!(prompt.contains("REPORT COMPLETE"));
    }
}
