//! Tool execution
//!
//! Looks a call up in the registry and runs it. Failures never escape as
//! errors to the conversation: `execute` turns them into the display string
//! that is handed back to the model.

use std::panic::{self, AssertUnwindSafe};

use crate::core::{ToolCall, ToolError};
use crate::tools::registry::ToolRegistry;

/// Run a call, keeping the failure kind
pub fn try_execute(call: &ToolCall, registry: &ToolRegistry) -> Result<String, ToolError> {
    if call.name.trim().is_empty() {
        return Err(ToolError::InvalidFormat);
    }

    let tool = registry
        .get(&call.name)
        .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;

    tracing::info!(tool = %call.name, "Executing tool");

    match panic::catch_unwind(AssertUnwindSafe(|| tool.call(&call.arguments))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "tool panicked".to_string());
            Err(ToolError::execution(&call.name, message))
        }
    }
}

/// Run a call and render the outcome as a display string
pub fn execute(call: &ToolCall, registry: &ToolRegistry) -> String {
    match try_execute(call, registry) {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(tool = %call.name, "Tool failed: {}", e);
            e.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::registry::FnTool;
    use serde_json::{json, Map};
    use std::sync::Arc;

    fn registry() -> ToolRegistry {
        ToolRegistry::from_tools(vec![
            Arc::new(FnTool::new("getCurrentTime", "time", |_| Ok("03:15 PM".into()))),
            Arc::new(FnTool::new("explode", "fails", |_| {
                Err(ToolError::execution("explode", "boom"))
            })),
            Arc::new(FnTool::new("panics", "panics", |_| panic!("kaput"))),
        ])
    }

    #[test]
    fn test_execute_success() {
        assert_eq!(execute(&ToolCall::bare("getCurrentTime"), &registry()), "03:15 PM");
    }

    #[test]
    fn test_unknown_tool() {
        let out = execute(&ToolCall::bare("teleport"), &registry());
        assert!(out.contains("Unknown tool"));
        assert!(out.contains("teleport"));
    }

    #[test]
    fn test_invalid_format() {
        let out = execute(&ToolCall::bare("  "), &registry());
        assert_eq!(out, "Error: Invalid tool call format");
    }

    #[test]
    fn test_tool_error_is_rendered() {
        let out = execute(&ToolCall::bare("explode"), &registry());
        assert!(out.contains("Error executing"));
        assert!(out.contains("boom"));
    }

    #[test]
    fn test_panic_is_contained() {
        let err = try_execute(&ToolCall::bare("panics"), &registry()).unwrap_err();
        assert_eq!(err, ToolError::execution("panics", "kaput"));
    }

    #[test]
    fn test_arguments_are_passed() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(FnTool::new(
            "count",
            "count keys",
            |args| Ok(args.len().to_string()),
        ))]);
        let mut args = Map::new();
        args.insert("a".into(), json!(1));
        args.insert("b".into(), json!(2));
        assert_eq!(execute(&ToolCall::new("count", args), &registry), "2");
    }
}
