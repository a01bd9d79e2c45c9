use crate::executor::PhaseKind;
use crate::executor::stream::LineActivity;
use crate::ui::icons::{BREAKER, CHECK, COMMIT, CROSS, DEV, REPORT, REVIEW, SKIP, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Terminal UI for an epic run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Story bar: how many stories have finished (succeeded, exhausted or skipped)
/// - Phase spinner: the phase currently running and its latest activity
pub struct StoryUI {
    multi: MultiProgress,
    story_bar: ProgressBar,
    phase_bar: ProgressBar,
    verbose: bool,
    phase_label: Mutex<String>,
}

impl StoryUI {
    /// Create the UI sized for `total_stories`.
    pub fn new(total_stories: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let story_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let story_bar = multi.add(ProgressBar::new(total_stories));
        story_bar.set_style(story_style);
        story_bar.set_prefix("Stories");

        let phase_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let phase_bar = multi.add(ProgressBar::new_spinner());
        phase_bar.set_style(phase_style);
        phase_bar.set_prefix("  Phase");

        Self {
            multi,
            story_bar,
            phase_bar,
            verbose,
            phase_label: Mutex::new(String::new()),
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    pub fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn start_story(&self, story: &str) {
        self.story_bar
            .set_message(format!("story {}", style(story).yellow()));
    }

    pub fn start_phase(&self, kind: PhaseKind, attempt: u32, max_attempts: u32) {
        let icon = match kind {
            PhaseKind::Dev => DEV,
            PhaseKind::Review => REVIEW,
            PhaseKind::Report => REPORT,
        };
        let label = if kind == PhaseKind::Report {
            format!("{}{}", icon, kind)
        } else {
            format!("{}{} attempt {}/{}", icon, kind, style(attempt).cyan(), max_attempts)
        };
        self.phase_bar
            .set_message(format!("{} {}", label, style("(starting...)").dim()));
        self.phase_bar
            .enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut current) = self.phase_label.lock() {
            *current = label;
        }
    }

    fn set_phase_detail(&self, detail: impl std::fmt::Display) {
        let label = self
            .phase_label
            .lock()
            .map(|l| l.clone())
            .unwrap_or_default();
        self.phase_bar.set_message(format!("{} {}", label, detail));
    }

    /// Short status step, echoed as a dim line in verbose mode.
    pub fn log_step(&self, msg: &str) {
        self.set_phase_detail(style(format!("({})", msg)).dim());
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(msg).dim()));
        }
    }

    /// Refresh the spinner with wall-clock elapsed time.
    pub fn update_elapsed(&self, elapsed: Duration) {
        let secs = elapsed.as_secs();
        let time_str = if secs >= 60 {
            format!("{}m {}s", secs / 60, secs % 60)
        } else {
            format!("{}s", secs)
        };
        self.set_phase_detail(style(format!("({})", time_str)).dim());
    }

    /// Show live agent activity parsed from the output stream.
    pub fn show_activity(&self, activity: &LineActivity) {
        match activity {
            LineActivity::ToolUse(desc) => {
                self.set_phase_detail(style(desc).yellow());
                self.print_line(format!("    {}", style(desc).yellow()));
            }
            LineActivity::Text(snippet) if !snippet.is_empty() => {
                self.set_phase_detail(style(snippet).dim());
                if self.verbose {
                    self.print_line(format!("    {}", style(snippet).dim()));
                }
            }
            _ => {}
        }
    }

    pub fn phase_failed(&self, kind: PhaseKind, reason: &str) {
        self.print_line(format!(
            "  {}{} failed: {}",
            CROSS,
            kind,
            style(reason).red()
        ));
    }

    pub fn committed(&self, story: &str, detail: &str) {
        self.print_line(format!("  {}{} {}", COMMIT, story, style(detail).dim()));
    }

    pub fn warning(&self, msg: &str) {
        self.print_line(format!("  {}{}", WARN, style(msg).yellow()));
    }

    pub fn story_succeeded(&self, story: &str, attempts: u32) {
        self.phase_bar.set_message("");
        self.print_line(format!(
            "{}Story {} complete ({} attempt{})",
            CHECK,
            style(story).green().bold(),
            attempts,
            if attempts == 1 { "" } else { "s" }
        ));
        self.story_bar.inc(1);
    }

    pub fn story_exhausted(&self, story: &str, attempts: u32) {
        self.phase_bar.set_message("");
        self.print_line(format!(
            "{}Story {} failed after {} attempts",
            CROSS,
            style(story).red().bold(),
            attempts
        ));
        self.story_bar.inc(1);
    }

    pub fn story_skipped(&self, story: &str) {
        self.print_line(format!("{}Story {} already done", SKIP, style(story).dim()));
    }

    pub fn halted(&self, consecutive: u32) {
        self.print_line(format!(
            "{}{}",
            BREAKER,
            style(format!(
                "Circuit breaker tripped after {} consecutive failed stories",
                consecutive
            ))
            .red()
            .bold()
        ));
    }

    /// Clear both bars at the end of the run.
    pub fn finish(&self) {
        self.phase_bar.finish_and_clear();
        self.story_bar.finish_and_clear();
    }
}
