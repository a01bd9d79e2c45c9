//! Integration tests for storyforge
//!
//! These drive the binary end to end against temporary projects.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a storyforge Command
fn storyforge() -> Command {
    cargo_bin_cmd!("storyforge")
}

/// Project with stories 3-1, 3-2 and 3-10 for epic 3, plus one for epic 4.
fn create_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let stories = dir.path().join("docs/stories");
    fs::create_dir_all(&stories).unwrap();
    write_story(&stories, "3-1-login.md", "Login", "ready-for-dev");
    write_story(&stories, "3-2-logout.md", "Logout", "ready-for-dev");
    write_story(&stories, "3-10-audit.md", "Audit trail", "ready-for-dev");
    write_story(&stories, "4-1-billing.md", "Billing", "ready-for-dev");
    dir
}

fn write_story(dir: &Path, name: &str, title: &str, status: &str) {
    fs::write(
        dir.join(name),
        format!("# {}\n\nStatus: {}\n\n## Tasks\n\n- [ ] do it\n", title, status),
    )
    .unwrap();
}

/// Metrics records written so far, oldest first.
fn metrics_files(dir: &TempDir) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = fs::read_dir(dir.path().join(".storyforge/metrics"))
        .map(|entries| entries.map(|e| e.unwrap().path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}

fn read_only_metrics(dir: &TempDir) -> String {
    let files = metrics_files(dir);
    assert_eq!(files.len(), 1, "expected one metrics record: {files:?}");
    fs::read_to_string(&files[0]).unwrap()
}

#[cfg(unix)]
fn fake_agent(dir: &TempDir, body: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    let path = dir.path().join("fake-agent.sh");
    fs::write(&path, format!("#!/bin/sh\ncat > /dev/null\n{}\n", body)).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path.display().to_string()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        storyforge()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("list"));
    }

    #[test]
    fn test_version() {
        storyforge().arg("--version").assert().success();
    }

    #[test]
    fn test_run_help_lists_flags() {
        storyforge()
            .args(["run", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--start-from"))
            .stdout(predicate::str::contains("--skip-done"))
            .stdout(predicate::str::contains("--dry-run"))
            .stdout(predicate::str::contains("--parallel"));
    }

    #[test]
    fn test_run_requires_epic_id() {
        storyforge().arg("run").assert().failure();
    }
}

// =============================================================================
// Listing
// =============================================================================

mod list {
    use super::*;

    #[test]
    fn test_list_in_version_order() {
        let dir = create_project();
        let output = storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["list", "3"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let stdout = String::from_utf8(output).unwrap();
        let p1 = stdout.find("3-1 ").unwrap();
        let p2 = stdout.find("3-2 ").unwrap();
        let p10 = stdout.find("3-10 ").unwrap();
        assert!(p1 < p2 && p2 < p10);
        assert!(!stdout.contains("4-1"));
        assert!(stdout.contains("3 stories"));
    }

    #[test]
    fn test_list_shows_ledger_status() {
        let dir = create_project();
        fs::write(
            dir.path().join("docs/sprint-status.yaml"),
            "development_status:\n  3-2-logout: done\n",
        )
        .unwrap();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["list", "3"])
            .assert()
            .success()
            .stdout(predicate::str::contains("done"));
    }

    #[test]
    fn test_list_unknown_epic_fails() {
        let dir = create_project();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["list", "9"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No stories found for epic 9"));
    }
}

// =============================================================================
// Running
// =============================================================================

mod run {
    use super::*;

    #[test]
    fn test_empty_discovery_fails_before_any_phase() {
        let dir = TempDir::new().unwrap();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--dry-run"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("No stories found"))
            .stderr(predicate::str::contains("docs/stories"));
        let transcripts = fs::read_dir(dir.path().join(".storyforge/prompts"))
            .map(|d| d.count())
            .unwrap_or(0);
        assert_eq!(transcripts, 0);
    }

    #[test]
    fn test_dry_run_end_to_end() {
        let dir = create_project();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--dry-run"])
            .env("CLAUDE_CMD", "/nonexistent/agent")
            .assert()
            .success()
            .stdout(predicate::str::contains("DRY RUN"))
            .stdout(predicate::str::contains("would run 3-1 (dev, review)"))
            .stdout(predicate::str::contains("3 completed, 0 failed"));

        let metrics = read_only_metrics(&dir);
        assert!(metrics.contains("dry_run: true"));
        assert!(metrics.contains("completed: 3"));
        // No ledger written in a dry run
        assert!(!dir.path().join("docs/sprint-status.yaml").exists());
        // Execution log exists
        let logs: Vec<_> = fs::read_dir(dir.path().join(".storyforge/logs"))
            .unwrap()
            .collect();
        assert_eq!(logs.len(), 1);
    }

    #[test]
    fn test_each_run_keeps_its_own_metrics_record() {
        let dir = create_project();
        let run = || {
            storyforge()
                .arg("--project-dir")
                .arg(dir.path())
                .args(["run", "3", "--dry-run"])
                .assert()
                .success();
        };
        run();
        // Run stamps have one-second resolution
        std::thread::sleep(std::time::Duration::from_millis(1100));
        run();

        let files = metrics_files(&dir);
        assert_eq!(files.len(), 2);
        for file in &files {
            let name = file.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("epic-3-metrics-"), "{name}");
            assert!(fs::read_to_string(file).unwrap().contains("completed: 3"));
        }
    }

    #[test]
    fn test_start_from_unknown_story_fails() {
        let dir = create_project();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--dry-run", "--start-from", "3-99"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("3-99"));
    }

    #[test]
    fn test_start_from_and_skip_done() {
        let dir = create_project();
        fs::write(
            dir.path().join("docs/sprint-status.yaml"),
            "development_status:\n  3-10-audit: done\n",
        )
        .unwrap();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--dry-run", "--start-from", "3-2", "--skip-done"])
            .assert()
            .success()
            .stdout(predicate::str::contains("1 story to run, 1 already done"))
            .stdout(predicate::str::contains("would run 3-2"))
            .stdout(predicate::str::contains("would run 3-1").not());
    }

    #[test]
    fn test_everything_done_exits_zero() {
        let dir = TempDir::new().unwrap();
        let stories = dir.path().join("docs/stories");
        fs::create_dir_all(&stories).unwrap();
        write_story(&stories, "3-1-login.md", "Login", "done");
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--skip-done"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Nothing to do"));
    }

    #[test]
    fn test_parallel_is_accepted_but_sequential() {
        let dir = create_project();
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--dry-run", "--parallel"])
            .assert()
            .success()
            .stderr(predicate::str::contains("not supported"));
    }

    #[cfg(unix)]
    #[test]
    fn test_agent_success_markers_exit_zero() {
        let dir = create_project();
        let agent = fake_agent(
            &dir,
            "echo 'IMPLEMENTATION COMPLETE'\necho 'REVIEW PASSED'\necho 'REPORT COMPLETE'",
        );
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--skip-review"])
            .env("CLAUDE_CMD", &agent)
            .assert()
            .code(0);

        let ledger = fs::read_to_string(dir.path().join("docs/sprint-status.yaml")).unwrap();
        assert!(ledger.contains("3-1: done"));
        assert!(ledger.contains("3-10: done"));
        let prompts = dir.path().join(".storyforge/prompts");
        assert!(prompts.join("3-3-1-dev-attempt-1-prompt.md").exists());
        assert!(prompts.join("3-3-1-dev-attempt-1-output.log").exists());
        assert!(prompts.join("3-report-prompt.md").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_silent_agent_trips_circuit_breaker() {
        let dir = create_project();
        let agent = fake_agent(&dir, "echo 'I did some things'");
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args([
                "run",
                "3",
                "--max-retries",
                "0",
                "--failure-threshold",
                "2",
            ])
            .env("CLAUDE_CMD", &agent)
            .assert()
            .code(2)
            .stdout(predicate::str::contains("halted by the circuit breaker"));

        let issues: Vec<_> = fs::read_dir(dir.path().join(".storyforge/issues"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(issues.len(), 1);
        let artifact = fs::read_to_string(&issues[0]).unwrap();
        assert!(artifact.contains("storyforge run 3 --start-from 3-2 --skip-done"));
        // 3-10 was never attempted
        assert!(
            !dir.path()
                .join(".storyforge/prompts/3-3-10-dev-attempt-1-prompt.md")
                .exists()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_blocked_agent_without_halt_exits_one() {
        let dir = TempDir::new().unwrap();
        let stories = dir.path().join("docs/stories");
        fs::create_dir_all(&stories).unwrap();
        write_story(&stories, "3-1-login.md", "Login", "ready-for-dev");
        let agent = fake_agent(&dir, "echo 'IMPLEMENTATION BLOCKED: missing credentials'");
        storyforge()
            .arg("--project-dir")
            .arg(dir.path())
            .args(["run", "3", "--max-retries", "1"])
            .env("CLAUDE_CMD", &agent)
            .assert()
            .code(1);

        let metrics = read_only_metrics(&dir);
        assert!(metrics.contains("failed: 1"));
        assert!(metrics.contains("missing credentials"));
        assert!(metrics.contains("attempts: 2"));
    }
}
