//! Recorded context of the latest generation

use std::sync::{Arc, Mutex};

use crate::core::Message;
use crate::llm::traits::ContextInspect;

/// Render messages in ChatML form
pub fn render_chatml(messages: &[Message]) -> String {
    let mut out = String::new();
    for msg in messages {
        out.push_str("<|im_start|>");
        out.push_str(msg.role.as_str());
        out.push('\n');
        out.push_str(&msg.content);
        out.push_str("<|im_end|>\n");
    }
    out
}

/// Context of the most recent exchange with a backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextSnapshot {
    /// Prompt and reply rendered as text
    pub text: String,
    /// Token ids, when the backend could tokenize
    pub tokens: Vec<u32>,
    /// Token texts, parallel to `tokens`
    pub pieces: Vec<String>,
    /// Usage-reported token count
    pub reported_tokens: usize,
}

impl ContextSnapshot {
    /// Snapshot of a prompt and its reply
    pub fn from_exchange(messages: &[Message], reply: &str, reported_tokens: usize) -> Self {
        let mut all = messages.to_vec();
        all.push(Message::assistant(reply));
        Self {
            text: render_chatml(&all),
            tokens: Vec::new(),
            pieces: Vec::new(),
            reported_tokens,
        }
    }
}

/// Shared, replaceable snapshot owned by a backend client
#[derive(Debug, Clone, Default)]
pub struct SnapshotCell(Arc<Mutex<ContextSnapshot>>);

impl SnapshotCell {
    /// Current snapshot
    pub fn get(&self) -> ContextSnapshot {
        match self.0.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the snapshot
    pub fn set(&self, snapshot: ContextSnapshot) {
        match self.0.lock() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}

impl ContextInspect for SnapshotCell {
    fn context_tokens(&self) -> Vec<u32> {
        self.get().tokens
    }

    fn token_count(&self) -> usize {
        let snapshot = self.get();
        if snapshot.tokens.is_empty() {
            snapshot.reported_tokens
        } else {
            snapshot.tokens.len()
        }
    }

    fn context_text(&self) -> String {
        self.get().text
    }

    fn token_pieces(&self) -> Vec<String> {
        self.get().pieces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_chatml() {
        let text = render_chatml(&[Message::system("Be brief."), Message::user("Hi")]);
        assert_eq!(
            text,
            "<|im_start|>system\nBe brief.<|im_end|>\n<|im_start|>user\nHi<|im_end|>\n"
        );
    }

    #[test]
    fn test_token_count_prefers_tokens() {
        let cell = SnapshotCell::default();
        cell.set(ContextSnapshot::from_exchange(&[Message::user("Hi")], "Hello", 7));
        assert_eq!(cell.token_count(), 7);
        assert!(cell.context_text().ends_with("<|im_start|>assistant\nHello<|im_end|>\n"));

        let mut snapshot = cell.get();
        snapshot.tokens = vec![1, 2, 3];
        cell.set(snapshot);
        assert_eq!(cell.token_count(), 3);
    }
}
