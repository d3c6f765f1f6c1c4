//! Tools module - tool registry, extraction and execution
//!
//! Contains the text tool-call extractor, the registry/executor pair and
//! the built-in tools.

pub mod builtin;
pub mod executor;
pub mod extract;
pub mod registry;

pub use builtin::{GetCurrentTime, SaveMemory};
pub use executor::{execute, try_execute};
pub use extract::extract;
pub use registry::{bind_arguments, FnTool, Tool, ToolRegistry};
