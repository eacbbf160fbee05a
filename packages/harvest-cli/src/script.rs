//! Recorded session scripts.
//!
//! A script is a JSON document with a list of steps replayed in order:
//!
//! ```json
//! { "steps": [
//!   { "action": "open", "page": "tab-1", "address": "https://example.com/chain-info?chain=ai" },
//!   { "action": "render", "page": "tab-1", "address": "https://example.com/chain-info?chain=ai",
//!     "payload": { "kind": "listing", "items": [{ "name": "Acme" }] } },
//!   { "action": "wait", "ms": 500 },
//!   { "action": "input", "page": "tab-1", "kind": "click" }
//! ] }
//! ```

use anyhow::{Context, Result};
use harvester::{InputKind, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Open a new page at an address and start watching it.
    Open { page: String, address: String },
    /// Set what the page shows whenever it is at `address`.
    Render {
        page: String,
        address: String,
        payload: Payload,
    },
    /// Full navigation: the browser reports it as an event.
    Navigate { page: String, address: String },
    /// Route change without a navigation event; only watchers see it.
    RouteChange { page: String, address: String },
    /// Body the page serves when it fetches `url` (externally referenced
    /// diagram sources).
    Resource {
        page: String,
        url: String,
        body: String,
    },
    /// New value for the attribute probe (in-place content swap).
    Probe { page: String, value: Value },
    /// Human input on the page.
    Input { page: String, kind: InputKind },
    /// Let time pass.
    Wait { ms: u64 },
    /// Stop watching a page.
    Close { page: String },
}

impl Script {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Script {} is not valid", path.display()))
    }

    /// Total scripted waiting time in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.steps
            .iter()
            .map(|step| match step {
                Step::Wait { ms } => *ms,
                _ => 0,
            })
            .sum()
    }
}
