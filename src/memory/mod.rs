//! Long-term memory - facts and preferences persisted across sessions

pub mod store;

pub use store::{render_summary, Fact, MemoryDocument, MemoryStore};
