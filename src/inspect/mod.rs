//! Inspect module - prompt and context debugging output

pub mod prompt;

pub use prompt::{Capture, InspectSection, PromptInspector, StructuredTokens};
