pub mod config;
pub mod errors;
pub mod escalation;
pub mod executor;
pub mod forge_config;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod story;
pub mod tracker;
pub mod ui;
