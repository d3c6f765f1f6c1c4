//! Long-term memory tool

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::{ToolDefinition, ToolError};
use crate::memory::MemoryStore;
use crate::tools::registry::{bind_arguments, Tool};

/// Saves facts and preferences the user shares
pub struct SaveMemory {
    store: MemoryStore,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Params {
    memory_type: String,
    content: String,
    #[serde(default)]
    key: Option<String>,
}

impl SaveMemory {
    /// Create the tool writing to `store`
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }
}

impl Tool for SaveMemory {
    fn name(&self) -> &str {
        "saveMemory"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "saveMemory",
            "Save important user information to your long term memory for retrieval later (user preferences, facts, etc.)",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "memory_type": {
                        "type": "string",
                        "description": "\"fact\" or \"preference\""
                    },
                    "content": {
                        "type": "string",
                        "description": "What to remember"
                    },
                    "key": {
                        "type": "string",
                        "description": "Preference name (preferences only)"
                    }
                },
                "required": ["memory_type", "content"]
            }),
        )
    }

    fn call(&self, arguments: &Map<String, Value>) -> Result<String, ToolError> {
        let params: Params = bind_arguments(self.name(), arguments)?;

        if params.memory_type == "fact" {
            self.store
                .add_fact(params.content)
                .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
            return Ok("Fact saved to memory".to_string());
        }

        let key = params
            .key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ToolError::execution(self.name(), "a key is required for preferences"))?;
        self.store
            .add_preference(key, params.content)
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        Ok("Preference saved to memory".to_string())
    }
}
