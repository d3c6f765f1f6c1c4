//! Current time tool

use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{ToolDefinition, ToolError};
use crate::tools::registry::{bind_arguments, Tool};

type Clock = Box<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Returns the local time as `HH:MM AM/PM`
pub struct GetCurrentTime {
    clock: Clock,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoParams {}

impl GetCurrentTime {
    /// Create the tool reading the system clock
    pub fn new() -> Self {
        Self {
            clock: Box::new(Local::now),
        }
    }

    /// Create the tool with a custom clock
    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Local> + Send + Sync + 'static,
    {
        Self {
            clock: Box::new(clock),
        }
    }
}

impl Default for GetCurrentTime {
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for GetCurrentTime {
    fn name(&self) -> &str {
        "getCurrentTime"
    }

    fn aliases(&self) -> &[&'static str] {
        &["get_current_time"]
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "getCurrentTime",
            "Get the current system time in 12-hour format (HH:MM AM/PM)",
            serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        )
    }

    fn call(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let _: NoParams = bind_arguments(self.name(), arguments)?;
        Ok((self.clock)().format("%I:%M %p").to_string())
    }
}
