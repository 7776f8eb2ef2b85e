pub mod agents;
pub mod backend;
pub mod cli;
pub mod config;
pub mod doctor;
pub mod error;
pub mod executor;
pub mod history;
pub mod modeltest;
pub mod orchestrator;
pub mod probe;
pub mod profiles;
pub mod router;
pub mod selector;
pub mod telemetry;
pub mod workflow;

#[cfg(test)]
mod tests;
