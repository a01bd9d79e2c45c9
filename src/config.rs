use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::forge_config::ForgeToml;

/// Name of the per-project state directory.
pub const STATE_DIR_NAME: &str = ".storyforge";

/// Command-line switches for one run, before merging with forge.toml.
#[derive(Debug, Clone, Default)]
pub struct RunFlags {
    pub dry_run: bool,
    pub skip_review: bool,
    pub no_commit: bool,
    pub skip_done: bool,
    pub start_from: Option<String>,
    pub verbose: bool,
    pub max_retries: Option<u32>,
    pub failure_threshold: Option<u32>,
}

/// Effective, merged options governing the epic run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub max_retries: u32,
    pub consecutive_failure_threshold: u32,
    pub skip_done: bool,
    pub start_from: Option<String>,
    pub skip_review: bool,
    pub no_commit: bool,
    pub dry_run: bool,
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_retries: 2,
            consecutive_failure_threshold: 3,
            skip_done: false,
            start_from: None,
            skip_review: false,
            no_commit: false,
            dry_run: false,
            verbose: false,
        }
    }
}

/// Everything a run needs to know, built once and never mutated.
///
/// Every component receives this by reference instead of reading process
/// globals, so two contexts never share log, metrics or ledger paths by
/// accident.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub epic_id: String,
    pub options: RunOptions,
    pub project_dir: PathBuf,
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
    pub metrics_dir: PathBuf,
    pub issues_dir: PathBuf,
    pub transcript_dir: PathBuf,
    pub story_dirs: Vec<PathBuf>,
    pub ledger_file: PathBuf,
    pub claude_cmd: String,
    pub skip_permissions: bool,
    /// `None` means a phase may block indefinitely.
    pub phase_timeout: Option<Duration>,
    /// Local start time of the run, `%Y%m%d-%H%M%S`; names per-run files.
    pub run_stamp: String,
}

impl PipelineContext {
    /// Merge forge.toml, environment and CLI flags into a context.
    pub fn new(project_dir: PathBuf, epic_id: &str, flags: RunFlags) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let state_dir = project_dir.join(STATE_DIR_NAME);
        let file = ForgeToml::load_or_default(&state_dir)?;
        Self::from_parts(project_dir, epic_id, flags, &file)
    }

    /// Build a context from an already-loaded file configuration.
    pub fn from_parts(
        project_dir: PathBuf,
        epic_id: &str,
        flags: RunFlags,
        file: &ForgeToml,
    ) -> Result<Self> {
        file.validate()?;
        let options = RunOptions {
            max_retries: flags.max_retries.unwrap_or(file.pipeline.max_retries),
            consecutive_failure_threshold: flags
                .failure_threshold
                .unwrap_or(file.pipeline.consecutive_failure_threshold),
            skip_done: flags.skip_done,
            start_from: flags.start_from.filter(|s| !s.trim().is_empty()),
            skip_review: flags.skip_review,
            no_commit: flags.no_commit,
            dry_run: flags.dry_run,
            verbose: flags.verbose,
        };
        if options.consecutive_failure_threshold == 0 {
            anyhow::bail!("--failure-threshold must be at least 1");
        }

        let state_dir = project_dir.join(STATE_DIR_NAME);
        let story_dirs = file
            .project
            .story_dirs
            .iter()
            .map(|d| resolve(&project_dir, d))
            .collect();
        let ledger_file = resolve(&project_dir, &file.project.ledger_file);
        let phase_timeout = match file.pipeline.phase_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            epic_id: epic_id.to_string(),
            options,
            log_dir: state_dir.join("logs"),
            metrics_dir: state_dir.join("metrics"),
            issues_dir: state_dir.join("issues"),
            transcript_dir: state_dir.join("prompts"),
            state_dir,
            story_dirs,
            ledger_file,
            claude_cmd: file.claude_cmd(),
            skip_permissions: file.skip_permissions(),
            phase_timeout,
            run_stamp: Local::now().format("%Y%m%d-%H%M%S").to_string(),
            project_dir,
        })
    }

    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.log_dir,
            &self.metrics_dir,
            &self.issues_dir,
            &self.transcript_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    /// One metrics record per run, so a resumed run never overwrites the
    /// record of the run it resumes.
    pub fn metrics_file(&self) -> PathBuf {
        self.metrics_dir.join(format!(
            "epic-{}-metrics-{}.yaml",
            self.epic_id, self.run_stamp
        ))
    }

    pub fn claude_flags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.skip_permissions {
            flags.push("--dangerously-skip-permissions".to_string());
        }
        flags.push("--print".to_string());
        flags.push("--output-format".to_string());
        flags.push("stream-json".to_string());
        flags.push("--verbose".to_string());
        flags
    }
}

fn resolve(project_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        project_dir.join(path)
    }
}
