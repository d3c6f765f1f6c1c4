//! Built-in tools
//!
//! Small local tools the agents register by default.

mod memory;
mod time;

pub use memory::SaveMemory;
pub use time::GetCurrentTime;
