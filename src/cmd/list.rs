//! `storyforge list <EPIC_ID>`: show the sequence without running anything.

use anyhow::Result;
use console::style;

use super::super::Cli;
use super::project_dir;

pub fn cmd_list(cli: &Cli, epic_id: &str) -> Result<()> {
    use storyforge::config::{PipelineContext, RunFlags};
    use storyforge::logging;
    use storyforge::store::{ItemRecordStore, LedgerStore, MarkdownRecordStore, YamlLedger};
    use storyforge::story::Sequencer;

    let _guard = logging::init(None, cli.verbose)?;
    let ctx = PipelineContext::new(project_dir(cli)?, epic_id, RunFlags::default())?;
    let sequencer = Sequencer::new(&ctx.epic_id, ctx.story_dirs.clone())?;
    let items = sequencer.discover()?;

    let records = MarkdownRecordStore::new();
    let ledger = YamlLedger::new(ctx.ledger_file.clone());

    // Pad before styling so escape codes do not skew the columns
    let show = |status: Option<String>| match status {
        Some(s) if s == "done" => style(format!("{:<16}", s)).green().to_string(),
        Some(s) => format!("{:<16}", s),
        None => style(format!("{:<16}", "-")).dim().to_string(),
    };

    println!();
    println!("Stories for epic {}:", style(&ctx.epic_id).bold());
    println!();
    println!("{:<12} {:<16} {:<16} Record", "Story", "Record status", "Ledger status");
    println!(
        "{:<12} {:<16} {:<16} ------",
        "-----", "-------------", "-------------"
    );
    for item in &items {
        let record_status = records.status(item).ok().flatten().map(|s| s.to_string());
        let ledger_status = ledger.status(&item.id).ok().flatten().map(|s| s.to_string());
        let location = item
            .primary_location()
            .map(|p| p.strip_prefix(&ctx.project_dir).unwrap_or(p).display().to_string())
            .unwrap_or_default();
        println!(
            "{:<12} {} {} {}",
            item.id.as_str(),
            show(record_status),
            show(ledger_status),
            style(location).dim()
        );
    }
    println!();
    println!("{} stor{}", items.len(), if items.len() == 1 { "y" } else { "ies" });
    println!();
    Ok(())
}
