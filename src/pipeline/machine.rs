//! Per-story lifecycle: Dev, then Review, with bounded whole-story retries.

use crate::config::RunOptions;
use crate::executor::{PhaseExecutor, PhaseKind, PhaseOutcome, PhaseRequest};
use crate::story::WorkItem;
use crate::ui::StoryUI;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Pending,
    DevRunning,
    DevFailed,
    DevSucceeded,
    ReviewRunning,
    ReviewFailed,
    ReviewSucceeded,
    Succeeded,
    Exhausted,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Succeeded | ItemState::Exhausted)
    }
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemState::Pending => "pending",
            ItemState::DevRunning => "dev-running",
            ItemState::DevFailed => "dev-failed",
            ItemState::DevSucceeded => "dev-succeeded",
            ItemState::ReviewRunning => "review-running",
            ItemState::ReviewFailed => "review-failed",
            ItemState::ReviewSucceeded => "review-succeeded",
            ItemState::Succeeded => "succeeded",
            ItemState::Exhausted => "exhausted",
        };
        f.write_str(s)
    }
}

/// Pure transition logic for one story.
///
/// `attempts` counts Dev starts: it becomes 1 on the first `DevRunning` and
/// grows by one on every retry, so it never exceeds `max_retries + 1`.
#[derive(Debug, Clone)]
pub struct ItemMachine {
    state: ItemState,
    attempts: u32,
    max_retries: u32,
    skip_review: bool,
    last_failure: Option<String>,
}

impl ItemMachine {
    pub fn new(max_retries: u32, skip_review: bool) -> Self {
        Self {
            state: ItemState::Pending,
            attempts: 0,
            max_retries,
            skip_review,
            last_failure: None,
        }
    }

    pub fn state(&self) -> ItemState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// The phase to execute in the current state, if any.
    pub fn running_phase(&self) -> Option<PhaseKind> {
        match self.state {
            ItemState::DevRunning => Some(PhaseKind::Dev),
            ItemState::ReviewRunning => Some(PhaseKind::Review),
            _ => None,
        }
    }

    /// Feed the outcome of the running phase. Ignored outside a running state.
    pub fn apply(&mut self, outcome: &PhaseOutcome) -> ItemState {
        let failure = outcome.failure_reason();
        self.state = match (self.state, failure) {
            (ItemState::DevRunning, None) => ItemState::DevSucceeded,
            (ItemState::DevRunning, Some(reason)) => {
                self.last_failure = Some(format!("dev {}", reason));
                ItemState::DevFailed
            }
            (ItemState::ReviewRunning, None) => ItemState::ReviewSucceeded,
            (ItemState::ReviewRunning, Some(reason)) => {
                self.last_failure = Some(format!("review {}", reason));
                ItemState::ReviewFailed
            }
            (state, _) => state,
        };
        self.state
    }

    /// Take every transition that needs no phase result.
    pub fn advance(&mut self) -> ItemState {
        self.state = match self.state {
            ItemState::Pending => {
                self.attempts = 1;
                ItemState::DevRunning
            }
            ItemState::DevFailed | ItemState::ReviewFailed => {
                if self.attempts <= self.max_retries {
                    self.attempts += 1;
                    ItemState::DevRunning
                } else {
                    ItemState::Exhausted
                }
            }
            ItemState::DevSucceeded if self.skip_review => ItemState::Succeeded,
            ItemState::DevSucceeded => ItemState::ReviewRunning,
            ItemState::ReviewSucceeded => ItemState::Succeeded,
            state => state,
        };
        self.state
    }
}

#[derive(Debug, Clone)]
pub struct ItemResult {
    pub state: ItemState,
    pub attempts: u32,
    pub last_failure: Option<String>,
    pub duration: Duration,
}

impl ItemResult {
    pub fn succeeded(&self) -> bool {
        self.state == ItemState::Succeeded
    }
}

/// Run one story to a terminal state.
///
/// Executor errors (the agent could not be started, I/O failures) are folded
/// into `Blocked` so they consume retries like any other failed phase.
pub async fn drive(
    executor: &dyn PhaseExecutor,
    epic_id: &str,
    item: &WorkItem,
    options: &RunOptions,
    ui: Option<&StoryUI>,
) -> ItemResult {
    let start = Instant::now();
    let mut machine = ItemMachine::new(options.max_retries, options.skip_review);
    let max_attempts = options.max_retries + 1;

    while !machine.advance().is_terminal() {
        let Some(kind) = machine.running_phase() else {
            continue;
        };
        let attempt = machine.attempts();
        let previous = if attempt > 1 {
            machine.last_failure().map(str::to_string)
        } else {
            None
        };
        if let Some(ui) = ui {
            ui.start_phase(kind, attempt, max_attempts);
        }
        tracing::info!(story = %item.id, phase = %kind, attempt, "phase started");

        let request = PhaseRequest::for_story(kind, epic_id, item, attempt, previous);
        let outcome = match executor.execute(&request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(story = %item.id, phase = %kind, error = %e, "phase executor failed");
                PhaseOutcome::Blocked(e.to_string())
            }
        };

        machine.apply(&outcome);
        match outcome.failure_reason() {
            None => tracing::info!(story = %item.id, phase = %kind, attempt, "phase succeeded"),
            Some(reason) => {
                tracing::warn!(story = %item.id, phase = %kind, attempt, reason = %reason, "phase failed");
                if let Some(ui) = ui {
                    ui.phase_failed(kind, &reason);
                }
            }
        }
    }

    ItemResult {
        state: machine.state(),
        attempts: machine.attempts(),
        last_failure: machine.last_failure().map(str::to_string),
        duration: start.elapsed(),
    }
}
