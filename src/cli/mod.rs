//! CLI module - command-line interface
//!
//! Contains the REPL and command parsing.

pub mod commands;
pub mod repl;

pub use repl::{Assistant, Repl, Session};
