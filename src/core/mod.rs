//! Command-line infrastructure: configuration, logging and terminal output.

pub mod config;
pub mod logging;
pub mod output;
pub mod progress;
