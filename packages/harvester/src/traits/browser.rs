//! Browser-driving collaborator.
//!
//! The orchestrator does not launch or drive browsers. It is handed pages
//! that can report their address, evaluate read-only expressions, fetch
//! bytes, and report human input.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::BrowserResult;
use crate::interaction::InputKind;

/// One open page (tab) of a live browser session.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Stable identifier for the page, used in logs.
    fn id(&self) -> &str;

    /// Address currently shown by the page.
    async fn address(&self) -> BrowserResult<String>;

    /// Evaluate a read-only expression in the page and return its JSON value.
    async fn evaluate(&self, expression: &str) -> BrowserResult<Value>;

    /// Fetch a remote resource with the page's cookies and referer.
    async fn fetch(&self, url: &str) -> BrowserResult<Vec<u8>>;

    /// Human input observed since the previous call.
    async fn drain_input(&self) -> BrowserResult<Vec<InputKind>>;
}
