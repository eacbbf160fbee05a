//! Timeout-bounded access to a browser page.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{BrowserResult, HarvestError, HarvestResult};
use crate::interaction::InputKind;
use crate::traits::browser::BrowserPage;

/// A page as seen by extractors and watchers.
///
/// Every call is bounded by the session's call timeout; expiry and browser
/// failures come back as transient [`HarvestError`]s.
#[derive(Clone)]
pub struct PageHandle {
    page: Arc<dyn BrowserPage>,
    call_timeout: Duration,
}

impl PageHandle {
    pub fn new(page: Arc<dyn BrowserPage>, call_timeout: Duration) -> Self {
        Self { page, call_timeout }
    }

    pub fn id(&self) -> &str {
        self.page.id()
    }

    pub fn inner(&self) -> &Arc<dyn BrowserPage> {
        &self.page
    }

    pub async fn address(&self) -> HarvestResult<String> {
        self.bounded("address", self.page.address()).await
    }

    pub async fn evaluate(&self, expression: &str) -> HarvestResult<Value> {
        self.bounded("evaluate", self.page.evaluate(expression)).await
    }

    /// Evaluate and decode the result.
    pub async fn evaluate_as<T: DeserializeOwned>(&self, expression: &str) -> HarvestResult<T> {
        let value = self.evaluate(expression).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn fetch(&self, url: &str) -> HarvestResult<Vec<u8>> {
        self.bounded("fetch", self.page.fetch(url)).await
    }

    pub async fn drain_input(&self) -> HarvestResult<Vec<InputKind>> {
        self.bounded("drain_input", self.page.drain_input()).await
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = BrowserResult<T>>,
    ) -> HarvestResult<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result.map_err(HarvestError::from),
            Err(_) => Err(HarvestError::Timeout {
                operation,
                after: self.call_timeout,
            }),
        }
    }
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("page", &self.page.id())
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrowserError;
    use crate::scripted::ScriptedPage;

    #[tokio::test(start_paused = true)]
    async fn slow_calls_time_out_as_transient_errors() {
        let page = Arc::new(ScriptedPage::new("tab-1", "https://example.com/"));
        page.set_latency(Duration::from_secs(30));
        let handle = PageHandle::new(page, Duration::from_secs(5));

        let err = handle.evaluate("1 + 1").await.unwrap_err();
        assert!(matches!(err, HarvestError::Timeout { operation: "evaluate", .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn browser_failures_map_to_transient_io() {
        let page = Arc::new(ScriptedPage::new("tab-1", "https://example.com/"));
        page.set_failing(true);
        let handle = PageHandle::new(page, Duration::from_secs(5));

        let err = handle.address().await.unwrap_err();
        assert!(matches!(err, HarvestError::TransientIo(_)));
    }

    #[tokio::test]
    async fn fetch_returns_bytes_or_a_transient_fetch_error() {
        let page = Arc::new(ScriptedPage::new("tab-1", "https://example.com/"));
        page.set_resource("https://cdn.example.com/a.svg", "<svg/>");
        let handle = PageHandle::new(page, Duration::from_secs(5));

        let bytes = handle.fetch("https://cdn.example.com/a.svg").await.unwrap();
        assert_eq!(bytes, b"<svg/>");

        let err = handle.fetch("https://cdn.example.com/gone.svg").await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::TransientIo(BrowserError::Fetch { ref url, .. }) if url == "https://cdn.example.com/gone.svg"
        ));
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetch_is_bounded_by_the_call_timeout() {
        let page = Arc::new(ScriptedPage::new("tab-1", "https://example.com/"));
        page.set_resource("https://cdn.example.com/a.svg", "<svg/>");
        page.set_latency(Duration::from_secs(30));
        let handle = PageHandle::new(page, Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let err = handle.fetch("https://cdn.example.com/a.svg").await.unwrap_err();
        assert!(matches!(err, HarvestError::Timeout { operation: "fetch", .. }));
        assert!(started.elapsed() < Duration::from_secs(30));
    }
}
