use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cmd;

#[derive(Parser)]
#[command(name = "storyforge")]
#[command(version, about = "Autonomous epic/story pipeline orchestrator")]
pub struct Cli {
    /// Show debug output on the console
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run every story of an epic through dev, review, commit and verification
    Run {
        /// Epic identifier, e.g. `3`
        epic_id: String,

        /// Invoke no agent and commit nothing; only report what would run
        #[arg(long)]
        dry_run: bool,

        /// Treat the review phase as passed
        #[arg(long)]
        skip_review: bool,

        /// Stage changes but never commit
        #[arg(long)]
        no_commit: bool,

        /// Resume from the first story whose id contains this value
        #[arg(long, value_name = "ID")]
        start_from: Option<String>,

        /// Skip stories already marked done in their record or the ledger
        #[arg(long)]
        skip_done: bool,

        /// Retries per story after the first attempt (overrides forge.toml)
        #[arg(long, value_name = "N")]
        max_retries: Option<u32>,

        /// Consecutive failed stories that halt the run (overrides forge.toml)
        #[arg(long, value_name = "N")]
        failure_threshold: Option<u32>,

        /// Experimental; not supported, stories always run sequentially
        #[arg(long)]
        parallel: bool,
    },
    /// List the stories of an epic in execution order with both status views
    List {
        /// Epic identifier, e.g. `3`
        epic_id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match &cli.command {
        Commands::Run { .. } => cmd::run_epic(&cli).await,
        Commands::List { epic_id } => cmd::cmd_list(&cli, epic_id).map(|()| 0),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!(
                "{} {:#}",
                console::style("Error:").red().bold(),
                e
            );
            ExitCode::from(1)
        }
    }
}
