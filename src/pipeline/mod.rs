//! The epic pipeline: per-story state machine, circuit breaker, dual-source
//! verification, and the final report phase.

pub mod breaker;
pub mod machine;
pub mod report;
pub mod runner;
pub mod verify;

pub use breaker::{BreakerState, CircuitBreaker};
pub use machine::{ItemMachine, ItemResult, ItemState};
pub use runner::{EXIT_HALTED, EXIT_STORY_FAILED, EXIT_SUCCESS, EpicRunner, RunOutcome};
pub use verify::{Verification, reconcile};
