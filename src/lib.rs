pub mod cli;
pub mod error;
pub mod fixtures;
pub mod git;
pub mod logger;
pub mod orchestrator;
pub mod permissions;
pub mod platform;
pub mod report;
