//! Tool registry - name to tool dispatch table
//!
//! Built once from a declared list of tools when an agent is constructed.
//! Lookup is by exact name; a tool may also answer to aliases.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{ToolDefinition, ToolError};

/// A locally callable tool
pub trait Tool: Send + Sync {
    /// Primary name the model calls the tool by
    fn name(&self) -> &str;

    /// Additional names that dispatch to this tool
    fn aliases(&self) -> &[&'static str] {
        &[]
    }

    /// Schema advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with named arguments
    fn call(&self, arguments: &Map<String, Value>) -> Result<String, ToolError>;
}

/// Bind a named-argument map to a tool's parameter struct.
///
/// Parameter structs use `#[serde(deny_unknown_fields)]`, so unexpected or
/// missing keys fail here the same way a bad keyword call would.
pub fn bind_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: &Map<String, Value>,
) -> Result<T, ToolError> {
    serde_json::from_value(Value::Object(arguments.clone()))
        .map_err(|e| ToolError::invalid_arguments(tool, e.to_string()))
}

type ToolFn = dyn Fn(&Map<String, Value>) -> Result<String, ToolError> + Send + Sync;

/// A tool backed by a closure
pub struct FnTool {
    name: String,
    description: String,
    parameters: Value,
    func: Box<ToolFn>,
}

impl FnTool {
    /// Wrap a closure as a tool taking no declared parameters
    pub fn new<F>(name: impl Into<String>, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            func: Box::new(func),
        }
    }
}

impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(&self.name, &self.description, self.parameters.clone())
    }

    fn call(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        (self.func)(arguments)
    }
}

/// Registry of available tools
#[derive(Clone, Default)]
pub struct ToolRegistry {
    /// Tools indexed by name and alias
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Primary names in registration order
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of tools
    pub fn from_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool under its name and aliases.
    ///
    /// A later tool with the same name replaces the earlier one along with
    /// its aliases. Primary names win over aliases: an alias that names
    /// another registered tool is ignored.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools
            .retain(|key, existing| key == &name || existing.name() != name);

        for alias in tool.aliases() {
            if *alias != name && self.order.iter().any(|n| n == alias) {
                tracing::warn!(
                    "Alias '{}' of tool '{}' shadows a registered tool; ignoring it",
                    alias,
                    name
                );
                continue;
            }
            self.tools.insert(alias.to_string(), Arc::clone(&tool));
        }
        if !self.order.contains(&name) {
            self.order.push(name.clone());
        }
        self.tools.insert(name, tool);
    }

    /// Look up a tool by name or alias
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Whether a name or alias is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Primary names in registration order
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Definitions of all tools in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Number of distinct tools
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no tools are registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.order)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn aliases(&self) -> &[&'static str] {
            &["say"]
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function("echo", "Echo text", serde_json::json!({}))
        }

        fn call(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
            #[derive(Deserialize)]
            #[serde(deny_unknown_fields)]
            struct Params {
                text: String,
            }
            let params: Params = bind_arguments(self.name(), arguments)?;
            Ok(params.text)
        }
    }

    #[test]
    fn test_register_with_aliases() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(Echo)]);
        assert!(registry.contains("echo"));
        assert!(registry.contains("say"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.names(), ["echo".to_string()]);
        assert_eq!(registry.definitions().len(), 1);
    }

    /// Claims another tool's name as an alias
    struct Shout;

    impl Tool for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn aliases(&self) -> &[&'static str] {
            &["echo", "yell"]
        }

        fn definition(&self) -> ToolDefinition {
            ToolDefinition::function("shout", "Shout text", serde_json::json!({}))
        }

        fn call(&self, _arguments: &Map<String, Value>) -> Result<String, ToolError> {
            Ok("HI".into())
        }
    }

    #[test]
    fn test_replacing_a_tool_drops_its_aliases() {
        let mut registry = ToolRegistry::from_tools(vec![Arc::new(Echo)]);
        registry.register(Arc::new(FnTool::new("echo", "Plain echo", |_| Ok("plain".into()))));

        assert!(registry.contains("echo"));
        assert!(!registry.contains("say"));
        assert_eq!(registry.names(), ["echo".to_string()]);
        assert_eq!(registry.get("echo").unwrap().call(&Map::new()).unwrap(), "plain");
    }

    #[test]
    fn test_alias_cannot_shadow_a_tool_name() {
        let registry = ToolRegistry::from_tools(vec![Arc::new(Echo), Arc::new(Shout)]);

        assert_eq!(registry.get("echo").unwrap().name(), "echo");
        assert_eq!(registry.get("yell").unwrap().name(), "shout");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_bind_arguments_rejects_unknown_keys() {
        let mut args = Map::new();
        args.insert("text".into(), Value::from("hi"));
        assert_eq!(Echo.call(&args).unwrap(), "hi");

        args.insert("loud".into(), Value::from(true));
        let err = Echo.call(&args).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
        assert!(err.to_string().starts_with("Error executing echo: "));
    }

    #[test]
    fn test_fn_tool() {
        let tool = FnTool::new("getCurrentTime", "Current time", |_| Ok("03:15 PM".into()));
        assert_eq!(tool.call(&Map::new()).unwrap(), "03:15 PM");
        assert_eq!(tool.definition().function.name, "getCurrentTime");
    }
}
