//! Typed access to the FitSnitch DynamoDB tables.
//!
//! See [`dynamodb`] for the table access layer. The remaining modules back
//! the `snitch-tables` command line.

pub mod command_line;
pub mod config;
pub mod dynamodb;
pub mod logging;
pub mod utils;
