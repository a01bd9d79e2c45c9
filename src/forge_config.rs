//! File configuration for storyforge, read from `.storyforge/forge.toml`.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! claude_cmd = "claude"
//! story_dirs = ["docs/stories", "docs/sprint-artifacts"]
//! ledger_file = "docs/sprint-status.yaml"
//!
//! [pipeline]
//! max_retries = 2
//! consecutive_failure_threshold = 3
//! phase_timeout_secs = 0
//! skip_permissions = true
//! ```
//!
//! Every key is optional. Layering is file → environment → CLI; the CLI
//! layer is applied in [`crate::config::PipelineContext::new`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "forge.toml";

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Agent CLI command (default: "claude")
    #[serde(default)]
    pub claude_cmd: Option<String>,
    /// Directories searched for story files, relative to the project root
    #[serde(default = "default_story_dirs")]
    pub story_dirs: Vec<PathBuf>,
    /// Aggregate status ledger, relative to the project root
    #[serde(default = "default_ledger_file")]
    pub ledger_file: PathBuf,
}

fn default_story_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("docs/stories"),
        PathBuf::from("docs/sprint-artifacts"),
    ]
}

fn default_ledger_file() -> PathBuf {
    PathBuf::from("docs/sprint-status.yaml")
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            claude_cmd: None,
            story_dirs: default_story_dirs(),
            ledger_file: default_ledger_file(),
        }
    }
}

/// Retry, circuit breaker and agent invocation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Retries per story after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Consecutive exhausted stories that halt the epic
    #[serde(default = "default_failure_threshold")]
    pub consecutive_failure_threshold: u32,
    /// Kill a phase after this many seconds; 0 disables the timeout
    #[serde(default)]
    pub phase_timeout_secs: u64,
    /// Pass --dangerously-skip-permissions to the agent
    #[serde(default = "default_skip_permissions")]
    pub skip_permissions: bool,
}

fn default_max_retries() -> u32 {
    2
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_skip_permissions() -> bool {
    true
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            consecutive_failure_threshold: default_failure_threshold(),
            phase_timeout_secs: 0,
            skip_permissions: default_skip_permissions(),
        }
    }
}

/// The complete forge.toml configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForgeToml {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

impl ForgeToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse forge.toml")
    }

    /// Load configuration from the state directory.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(state_dir: &Path) -> Result<Self> {
        let config_path = state_dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Get the agent command, with fallback to environment variable.
    pub fn claude_cmd(&self) -> String {
        self.project
            .claude_cmd
            .clone()
            .or_else(|| std::env::var("CLAUDE_CMD").ok())
            .unwrap_or_else(|| "claude".to_string())
    }

    /// Get skip_permissions; `SKIP_PERMISSIONS=false` in the environment wins.
    pub fn skip_permissions(&self) -> bool {
        match std::env::var("SKIP_PERMISSIONS") {
            Ok(v) if v == "false" => false,
            _ => self.pipeline.skip_permissions,
        }
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.consecutive_failure_threshold == 0 {
            anyhow::bail!("pipeline.consecutive_failure_threshold must be at least 1");
        }
        if self.project.story_dirs.is_empty() {
            anyhow::bail!("project.story_dirs must name at least one directory");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ForgeToml::default();
        assert_eq!(config.pipeline.max_retries, 2);
        assert_eq!(config.pipeline.consecutive_failure_threshold, 3);
        assert_eq!(config.pipeline.phase_timeout_secs, 0);
        assert_eq!(
            config.project.ledger_file,
            PathBuf::from("docs/sprint-status.yaml")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file_keeps_defaults() {
        let config = ForgeToml::parse(
            r#"
[pipeline]
max_retries = 5
"#,
        )
        .unwrap();
        assert_eq!(config.pipeline.max_retries, 5);
        assert_eq!(config.pipeline.consecutive_failure_threshold, 3);
        assert_eq!(config.project.story_dirs.len(), 2);
    }

    #[test]
    fn test_parse_full_file() {
        let config = ForgeToml::parse(
            r#"
[project]
claude_cmd = "/opt/bin/claude"
story_dirs = ["stories"]
ledger_file = "status.yaml"

[pipeline]
max_retries = 1
consecutive_failure_threshold = 2
phase_timeout_secs = 900
skip_permissions = false
"#,
        )
        .unwrap();
        assert_eq!(config.claude_cmd(), "/opt/bin/claude");
        assert_eq!(config.project.story_dirs, vec![PathBuf::from("stories")]);
        assert_eq!(config.pipeline.phase_timeout_secs, 900);
        assert!(!config.pipeline.skip_permissions);
    }

    #[test]
    fn test_parse_invalid_toml_errors() {
        let err = ForgeToml::parse("[pipeline\nmax_retries = ").unwrap_err();
        assert!(err.to_string().contains("forge.toml"));
    }

    #[test]
    fn test_validate_rejects_zero_threshold() {
        let mut config = ForgeToml::default();
        config.pipeline.consecutive_failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempdir().unwrap();
        let config = ForgeToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.pipeline.max_retries, 2);
    }

    #[test]
    fn test_load_or_default_reads_file() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[pipeline]\nconsecutive_failure_threshold = 7\n",
        )
        .unwrap();
        let config = ForgeToml::load_or_default(dir.path()).unwrap();
        assert_eq!(config.pipeline.consecutive_failure_threshold, 7);
    }
}
