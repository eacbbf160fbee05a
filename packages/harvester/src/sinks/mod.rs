//! Persistence sinks.
//!
//! Available sinks:
//! - `JsonFileSink` - one pretty JSON document per collected resource
//! - `MemorySink` - in-memory, for tests (see [`crate::testing`])

pub mod json_file;

pub use json_file::JsonFileSink;
