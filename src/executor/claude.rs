use super::prompt::build_prompt;
use super::stream::StreamCollector;
use super::{PhaseExecutor, PhaseOutcome, PhaseRequest, classify};
use crate::config::PipelineContext;
use crate::errors::OrchestratorError;
use crate::ui::StoryUI;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};

/// Runs each phase as a fresh agent CLI process.
///
/// The prompt goes in on stdin, `stream-json` comes out on stdout. Prompt
/// and combined output are kept under the transcript directory for every
/// invocation.
pub struct ClaudeExecutor {
    claude_cmd: String,
    flags: Vec<String>,
    project_dir: PathBuf,
    transcript_dir: PathBuf,
    timeout: Option<Duration>,
    dry_run: bool,
    ui: Option<Arc<StoryUI>>,
}

impl ClaudeExecutor {
    pub fn new(ctx: &PipelineContext, ui: Option<Arc<StoryUI>>) -> Self {
        Self {
            claude_cmd: ctx.claude_cmd.clone(),
            flags: ctx.claude_flags(),
            project_dir: ctx.project_dir.clone(),
            transcript_dir: ctx.transcript_dir.clone(),
            timeout: ctx.phase_timeout,
            dry_run: ctx.options.dry_run,
            ui,
        }
    }

    fn log_step(&self, msg: &str) {
        if let Some(ref ui) = self.ui {
            ui.log_step(msg);
        }
    }

    /// Stream stdout into the collector until EOF, then reap the child.
    async fn drain(
        &self,
        child: &mut Child,
        collector: &mut StreamCollector,
    ) -> Result<ExitStatus, OrchestratorError> {
        let stdout = child.stdout.take().ok_or_else(|| {
            OrchestratorError::ProcessIo(std::io::Error::other("agent stdout was not captured"))
        })?;
        let mut reader = BufReader::new(stdout).lines();
        while let Some(line) = reader
            .next_line()
            .await
            .map_err(OrchestratorError::ProcessIo)?
        {
            let activity = collector.push_line(&line);
            if let Some(ref ui) = self.ui {
                ui.show_activity(&activity);
            }
        }
        child.wait().await.map_err(OrchestratorError::ProcessIo)
    }
}

#[async_trait]
impl PhaseExecutor for ClaudeExecutor {
    async fn execute(&self, request: &PhaseRequest) -> Result<PhaseOutcome, OrchestratorError> {
        let label = request.label();
        let prompt = build_prompt(request);

        if self.dry_run {
            tracing::info!(phase = %request.kind, label = %label, "dry run, agent not invoked");
            return Ok(PhaseOutcome::Success);
        }

        std::fs::create_dir_all(&self.transcript_dir).map_err(|source| {
            OrchestratorError::PromptWriteFailed {
                path: self.transcript_dir.clone(),
                source,
            }
        })?;
        let prompt_file = self.transcript_dir.join(format!("{}-prompt.md", label));
        std::fs::write(&prompt_file, &prompt).map_err(|source| {
            OrchestratorError::PromptWriteFailed {
                path: prompt_file.clone(),
                source,
            }
        })?;
        let output_file = self.transcript_dir.join(format!("{}-output.log", label));

        let cmd_display = format!("{} {}", self.claude_cmd, self.flags.join(" "));
        self.log_step(&format!("Spawning: {}", cmd_display));
        tracing::debug!(command = %cmd_display, label = %label, "spawning agent");

        let start = Instant::now();
        let mut child = Command::new(&self.claude_cmd)
            .args(&self.flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&self.project_dir)
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| OrchestratorError::SpawnFailed {
                command: self.claude_cmd.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(OrchestratorError::ProcessIo)?;
            stdin.shutdown().await.map_err(OrchestratorError::ProcessIo)?;
        }

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        let ui = self.ui.clone();
        let elapsed_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(10));
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Some(ref ui) = ui {
                    ui.update_elapsed(start.elapsed());
                }
            }
        });

        let mut collector = StreamCollector::new();
        let status = match self.timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.drain(&mut child, &mut collector)).await {
                    Ok(status) => Some(status),
                    Err(_) => {
                        let _ = child.kill().await;
                        None
                    }
                }
            }
            None => Some(self.drain(&mut child, &mut collector).await),
        };
        elapsed_task.abort();

        // A killed agent's grandchildren may still hold stderr open
        if let Some(task) = stderr_task {
            if status.is_some() {
                if let Ok(stderr) = task.await {
                    collector.push_stderr(&stderr);
                }
            } else {
                task.abort();
            }
        }

        let is_error = collector.is_error;
        let output = collector.finish();
        std::fs::write(&output_file, &output).map_err(|source| {
            OrchestratorError::OutputWriteFailed {
                path: output_file.clone(),
                source,
            }
        })?;

        let duration = start.elapsed();
        let status = match status {
            Some(status) => status?,
            None => {
                let limit = self.timeout.unwrap_or_default();
                tracing::warn!(label = %label, timeout_secs = limit.as_secs(), "agent timed out");
                return Ok(PhaseOutcome::Blocked(format!(
                    "timed out after {}s",
                    limit.as_secs()
                )));
            }
        };

        let exit_code = status.code().unwrap_or(-1);
        self.log_step(&format!(
            "Completed in {:.1}s (exit: {})",
            duration.as_secs_f64(),
            exit_code
        ));
        tracing::info!(
            label = %label,
            exit_code,
            duration_secs = duration.as_secs_f64(),
            "agent finished"
        );
        if is_error {
            tracing::warn!(label = %label, "agent reported an error result");
        }

        Ok(classify(&output, &request.kind.sentinels()))
    }
}
