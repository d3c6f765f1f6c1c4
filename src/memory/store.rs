//! JSON-file backed long-term memory
//!
//! Every mutation loads the whole document, changes it in memory and writes
//! it back. There is no locking: concurrent writers race and the last write
//! wins.

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::Result;

/// A remembered fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    /// What was remembered
    pub content: String,
    /// Local ISO-8601 time the fact was stored
    pub timestamp: String,
}

/// The persisted memory document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Facts in the order they were stored
    #[serde(default)]
    pub facts: Vec<Fact>,
    /// User preferences, last write wins
    #[serde(default)]
    pub preferences: Map<String, Value>,
    /// Reserved
    #[serde(default)]
    pub conversations: Vec<Value>,
}

/// Read-modify-write store over a single JSON document
#[derive(Debug, Clone)]
pub struct MemoryStore {
    path: PathBuf,
}

impl MemoryStore {
    /// Create a store backed by `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing or unreadable file is an empty document.
    pub fn load(&self) -> MemoryDocument {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(_) => return MemoryDocument::default(),
        };

        match serde_json::from_str(&data) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    "Memory file is not valid, starting empty: {}",
                    e
                );
                MemoryDocument::default()
            }
        }
    }

    /// Write the whole document, creating parent directories as needed
    pub fn save(&self, doc: &MemoryDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(doc)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Append a fact stamped with the current local time
    pub fn add_fact(&self, fact: impl Into<String>) -> Result<()> {
        let mut doc = self.load();
        doc.facts.push(Fact {
            content: fact.into(),
            timestamp: Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        });
        self.save(&doc)
    }

    /// Add or overwrite a preference
    pub fn add_preference(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        let mut doc = self.load();
        doc.preferences.insert(key.into(), value.into());
        self.save(&doc)
    }

    /// Remove a preference. Returns whether the key existed; the file is
    /// only rewritten when it did.
    pub fn remove_preference(&self, key: &str) -> Result<bool> {
        let mut doc = self.load();
        if doc.preferences.shift_remove(key).is_none() {
            return Ok(false);
        }
        self.save(&doc)?;
        Ok(true)
    }

    /// Reset to an empty document
    pub fn clear(&self) -> Result<()> {
        self.save(&MemoryDocument::default())
    }

    /// All stored facts
    pub fn get_facts(&self) -> Vec<Fact> {
        self.load().facts
    }

    /// All stored preferences
    pub fn get_preferences(&self) -> Map<String, Value> {
        self.load().preferences
    }

    /// Human-readable summary for prompt injection.
    ///
    /// Empty sections are left out entirely.
    pub fn get_memory_summary(&self) -> String {
        render_summary(&self.load())
    }
}

/// Render a document as the fixed summary block
pub fn render_summary(doc: &MemoryDocument) -> String {
    let mut summary = String::from("\n=== LONG-TERM MEMORY ===\n");

    if !doc.facts.is_empty() {
        summary.push_str("\nKnown Facts:\n");
        for fact in &doc.facts {
            summary.push_str(&format!("- {}\n", fact.content));
        }
    }

    if !doc.preferences.is_empty() {
        summary.push_str("\nUser Preferences:\n");
        for (key, value) in &doc.preferences {
            summary.push_str(&format!("- {}: {}\n", key, display_value(value)));
        }
    }

    summary
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use serde_json::json;
    use tempfile::TempDir;

    fn store() -> (TempDir, MemoryStore) {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::new(dir.path().join("memory.json"));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert_eq!(store.load(), MemoryDocument::default());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let (_dir, store) = store();
        fs::write(store.path(), "invalid json content").unwrap();
        assert_eq!(store.load(), MemoryDocument::default());
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let (_dir, store) = store();
        fs::write(store.path(), r#"{"preferences": {"theme": "dark"}}"#).unwrap();
        let doc = store.load();
        assert!(doc.facts.is_empty());
        assert_eq!(doc.preferences["theme"], json!("dark"));
    }

    #[test]
    fn test_add_fact_timestamp() {
        let (_dir, store) = store();
        store.add_fact("User prefers Python over JavaScript").unwrap();

        let facts = store.get_facts();
        let last = facts.last().unwrap();
        assert_eq!(last.content, "User prefers Python over JavaScript");
        assert!(NaiveDateTime::parse_from_str(&last.timestamp, "%Y-%m-%dT%H:%M:%S%.f").is_ok());
    }

    #[test]
    fn test_preference_overwrite() {
        let (_dir, store) = store();
        store.add_preference("theme", "light").unwrap();
        store.add_preference("theme", "dark").unwrap();
        assert_eq!(store.get_preferences()["theme"], json!("dark"));
        assert_eq!(store.get_preferences().len(), 1);
    }

    #[test]
    fn test_remove_preference() {
        let (_dir, store) = store();
        store.add_preference("theme", "dark").unwrap();

        assert!(store.remove_preference("theme").unwrap());
        assert!(store.get_preferences().is_empty());

        let before = store.load();
        assert!(!store.remove_preference("theme").unwrap());
        assert_eq!(store.load(), before);
    }

    #[test]
    fn test_pretty_printed_with_two_spaces() {
        let (_dir, store) = store();
        store.add_preference("name", "Alex").unwrap();
        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"facts\": []"));
        assert!(raw.contains("\n    \"name\": \"Alex\""));
    }

    #[test]
    fn test_summary_sections() {
        let (_dir, store) = store();
        let empty = store.get_memory_summary();
        assert!(empty.contains("=== LONG-TERM MEMORY ==="));
        assert!(!empty.contains("Known Facts"));
        assert!(!empty.contains("User Preferences"));

        store.add_fact("Name is Alex").unwrap();
        store.add_preference("editor", "vim").unwrap();
        store.add_preference("verbose", true).unwrap();

        let summary = store.get_memory_summary();
        assert!(summary.contains("\nKnown Facts:\n- Name is Alex\n"));
        assert!(summary.contains("\nUser Preferences:\n- editor: vim\n- verbose: true\n"));
    }
}
