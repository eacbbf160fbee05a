//! Collaborator seams.
//!
//! These traits define what applications plug into the orchestrator:
//! the browser pages it observes, the category handlers that extract
//! payloads, and the sink that persists them.

pub mod browser;
pub mod extractor;
pub mod sink;
