//! Session history and audit log storage for Cinder.

pub mod in_memory;
pub mod history_log;

pub use in_memory::InMemorySessionStore;
pub use history_log::HistoryLog;
