//! Core module - shared infrastructure for Parley
//!
//! This module contains foundational types, configuration, and error handling
//! used throughout the crate.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{BackendKind, Config};
pub use error::{ParleyError, Result, ToolError};
pub use logging::init_logging;
pub use types::*;
