//! qconv CLI library
//!
//! Exposes the command implementations and argument parsing for testing.

pub mod commands;
pub mod exit;
pub mod logging;

pub use commands::{CaseSelection, ListCommand, RunCommand};
