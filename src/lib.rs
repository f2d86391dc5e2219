pub mod agent;
pub mod config;
pub mod errors;
pub mod executor;
pub mod logging;
pub mod machine;
pub mod orchestrator;
pub mod signals;
pub mod snapshot;
pub mod stream;
pub mod tracker;
pub mod ui;
