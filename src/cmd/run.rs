//! `storyforge run <EPIC_ID>`: the full epic pipeline.

use anyhow::{Context, Result};
use console::style;
use std::sync::Arc;

use super::super::{Cli, Commands};
use super::project_dir;

pub async fn run_epic(cli: &Cli) -> Result<u8> {
    use storyforge::config::{PipelineContext, RunFlags};
    use storyforge::executor::ClaudeExecutor;
    use storyforge::logging;
    use storyforge::pipeline::{EXIT_SUCCESS, EpicRunner};
    use storyforge::store::{MarkdownRecordStore, YamlLedger};
    use storyforge::story::{Sequencer, SequencerOptions};
    use storyforge::tracker::GitTracker;
    use storyforge::ui::StoryUI;

    let Commands::Run {
        epic_id,
        dry_run,
        skip_review,
        no_commit,
        start_from,
        skip_done,
        max_retries,
        failure_threshold,
        parallel,
    } = &cli.command
    else {
        anyhow::bail!("run_epic called for a different command");
    };

    let flags = RunFlags {
        dry_run: *dry_run,
        skip_review: *skip_review,
        no_commit: *no_commit,
        skip_done: *skip_done,
        start_from: start_from.clone(),
        verbose: cli.verbose,
        max_retries: *max_retries,
        failure_threshold: *failure_threshold,
    };
    let ctx = PipelineContext::new(project_dir(cli)?, epic_id, flags)?;
    let sequencer = Sequencer::new(&ctx.epic_id, ctx.story_dirs.clone())?;
    ctx.ensure_directories()?;

    let log_file = logging::log_file_path(&ctx.log_dir, &ctx.epic_id);
    let _log_guard = logging::init(Some(&log_file), cli.verbose)?;
    tracing::info!(epic = %ctx.epic_id, log = %log_file.display(), "execution log opened");

    if *parallel {
        tracing::warn!("--parallel is not supported; stories will run sequentially");
    }

    let records = MarkdownRecordStore::new();
    let ledger = YamlLedger::new(ctx.ledger_file.clone());
    let sequence = sequencer
        .sequence(
            &SequencerOptions {
                start_from: ctx.options.start_from.clone(),
                skip_done: ctx.options.skip_done,
            },
            &records,
            &ledger,
        )
        .context("Failed to build the story sequence")?;

    println!();
    println!(
        "{} epic {}: {} stor{} to run, {} already done",
        style("storyforge").bold().cyan(),
        style(&ctx.epic_id).bold(),
        sequence.items.len(),
        if sequence.items.len() == 1 { "y" } else { "ies" },
        sequence.skipped_done.len()
    );
    if ctx.options.dry_run {
        println!(
            "{}",
            style("DRY RUN: no agent is invoked and nothing is committed").yellow()
        );
        for item in &sequence.items {
            let phases = if ctx.options.skip_review {
                "dev"
            } else {
                "dev, review"
            };
            println!("  would run {} ({})", item.id, phases);
        }
    }
    println!();

    if sequence.items.is_empty() {
        println!("Nothing to do: every story is already done.");
        return Ok(EXIT_SUCCESS);
    }

    let vcs = if ctx.options.dry_run {
        None
    } else {
        match GitTracker::new(&ctx.project_dir) {
            Ok(tracker) => Some(tracker),
            Err(e) => {
                tracing::warn!(error = %e, "not a git repository; commits disabled");
                None
            }
        }
    };

    let ui = Arc::new(StoryUI::new(sequence.items.len() as u64, cli.verbose));
    let executor = ClaudeExecutor::new(&ctx, Some(ui.clone()));
    let mut runner = EpicRunner::new(&ctx, &executor, &records, &ledger).with_ui(ui.clone());
    if let Some(ref tracker) = vcs {
        runner = runner.with_vcs(tracker);
    }

    let outcome = runner.run(sequence).await;
    ui.finish();

    let totals = outcome.totals;
    println!();
    println!("{}", style("Run summary").bold());
    println!(
        "  {} completed, {} failed, {} skipped (of {})",
        style(totals.completed).green(),
        style(totals.failed).red(),
        style(totals.skipped).dim(),
        totals.total
    );
    println!("  Metrics: {}", outcome.metrics_file.display());
    println!("  Log:     {}", log_file.display());
    if !outcome.report_completed {
        println!("  {}", style("Epic report failed; see the log").yellow());
    }
    if let Some(ref artifact) = outcome.issue_artifact {
        println!();
        println!(
            "{} {}",
            style("Run halted by the circuit breaker. Details and resume command:")
                .red()
                .bold(),
            artifact.display()
        );
    }
    println!();

    Ok(outcome.exit_code)
}
