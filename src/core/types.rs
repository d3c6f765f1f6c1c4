//! Shared types used across Parley modules
//!
//! Contains message structures, tool definitions, and common data types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Wire name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Name of the tool that produced this message (tool role only)
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl Message {
    /// Create a message with an arbitrary role
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_name: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a tool result message
    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// A tool call recovered from model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the tool to invoke, never empty
    pub name: String,
    /// Named arguments, in the order the model wrote them
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call without arguments
    pub fn bare(name: impl Into<String>) -> Self {
        Self::new(name, Map::new())
    }

    /// Build a call from a parsed JSON value.
    ///
    /// Returns `None` unless the value is an object with a non-empty string
    /// `name`. `arguments` may be an object or a string holding a JSON
    /// object; anything else becomes an empty map.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let name = obj.get("name")?.as_str()?;
        if name.is_empty() {
            return None;
        }
        let arguments = match obj.get("arguments") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::String(raw)) => serde_json::from_str::<Map<String, Value>>(raw)
                .unwrap_or_default(),
            _ => Map::new(),
        };
        Some(Self::new(name, arguments))
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Definition of a tool that can be advertised to the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call that was executed
    pub call: ToolCall,
    /// Display string; failures are encoded as readable error text
    pub result: String,
}

impl ToolResult {
    /// Pair a call with its display result
    pub fn new(call: ToolCall, result: impl Into<String>) -> Self {
        Self {
            call,
            result: result.into(),
        }
    }

    /// One line for the follow-up prompt
    pub fn summary_line(&self) -> String {
        format!("Tool '{}' returned: {}", self.call.name, self.result)
    }
}
