use super::{IssueCategory, IssueEntry, MetricsRecord, StoryMetrics, StoryOutcome, Totals};
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Accumulates the metrics record for one epic run.
///
/// The in-memory record is authoritative. After every story the YAML file is
/// updated in place; once an update fails the recorder stops touching the
/// file and rewrites it whole at [`MetricsRecorder::finalize`].
pub struct MetricsRecorder {
    path: PathBuf,
    record: MetricsRecord,
    degraded: bool,
}

impl MetricsRecorder {
    /// Create the record with zeroed counters and write the initial file.
    pub fn start(path: &Path, epic_id: &str, dry_run: bool, total: usize) -> Self {
        let mut recorder = Self {
            path: path.to_path_buf(),
            record: MetricsRecord::new(epic_id, dry_run, total),
            degraded: false,
        };
        if let Err(e) = recorder.write_full() {
            recorder.enter_degraded(&e);
        }
        recorder
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &MetricsRecord {
        &self.record
    }

    pub fn totals(&self) -> Totals {
        self.record.totals
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Record a finished story. Exactly one counter is incremented.
    pub fn record_story(&mut self, story: StoryMetrics) {
        let totals = &mut self.record.totals;
        match story.outcome {
            StoryOutcome::Completed => totals.completed += 1,
            StoryOutcome::Failed => totals.failed += 1,
            StoryOutcome::Skipped => totals.skipped += 1,
        }
        self.record.stories.push(story);
        self.persist_incremental();
    }

    pub fn record_issue(&mut self, issue: IssueEntry) {
        self.record.issues.push(issue);
        self.persist_incremental();
    }

    /// Stamp the end time and write the whole record.
    ///
    /// Never fails: a write error here is only logged.
    pub fn finalize(&mut self, halted: bool) -> &MetricsRecord {
        self.record.halted = halted;
        self.record.degraded = self.degraded;
        if self.degraded {
            self.record.issues.push(IssueEntry::new(
                IssueCategory::Degradation,
                None,
                "incremental metrics updates were skipped; record rewritten at finalize",
            ));
        }
        self.record.finish();
        match self.write_full() {
            Ok(()) => tracing::info!(path = %self.path.display(), "metrics finalized"),
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %format!("{:#}", e),
                "failed to write final metrics record"
            ),
        }
        &self.record
    }

    fn persist_incremental(&mut self) {
        if self.degraded {
            return;
        }
        if let Err(e) = self.update_in_place() {
            self.enter_degraded(&e);
        }
    }

    fn enter_degraded(&mut self, err: &anyhow::Error) {
        self.degraded = true;
        tracing::warn!(
            path = %self.path.display(),
            error = %format!("{:#}", err),
            "degraded observability: metrics will only be written at finalize"
        );
    }

    /// Read-modify-write of the counters, story and issue lists.
    fn update_in_place(&self) -> Result<()> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let mut doc: Value = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        let map = doc
            .as_mapping_mut()
            .context("Metrics file is not a YAML mapping")?;

        let run_id = Value::from(self.record.run_id.to_string());
        if map.get("run_id") != Some(&run_id) {
            anyhow::bail!("Metrics file belongs to a different run");
        }
        map.insert("totals".into(), serde_yaml::to_value(self.record.totals)?);
        map.insert("stories".into(), serde_yaml::to_value(&self.record.stories)?);
        map.insert("issues".into(), serde_yaml::to_value(&self.record.issues)?);

        let yaml = serde_yaml::to_string(&doc).context("Failed to serialize metrics")?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    fn write_full(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(&self.record).context("Failed to serialize metrics")?;
        fs::write(&self.path, yaml)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
