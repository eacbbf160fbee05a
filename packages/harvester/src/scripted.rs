//! Scripted browser collaborators.
//!
//! [`ScriptedPage`] plays back addresses, payloads, probe values, fetchable
//! resources and human input set by its driver. [`PageExtractor`] reads the
//! payload a scripted page renders. The `harvest replay` command drives
//! recorded sessions through these, and the test suites use them as the
//! browser.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use crate::error::{BrowserError, BrowserResult, HarvestError, HarvestResult};
use crate::identifier::{canonicalize, CanonicalKey};
use crate::interaction::InputKind;
use crate::page::PageHandle;
use crate::traits::{browser::BrowserPage, extractor::Extractor};
use crate::types::{category::ResourceCategory, payload::Payload};

/// Expression a [`ScriptedPage`] answers with the payload for its current
/// address (JSON `null` when none is scripted).
pub const PAYLOAD_PROBE: &str = "window.__harvestPayload";

/// A browser page whose state is set by its driver.
pub struct ScriptedPage {
    id: String,

    /// Current address
    address: RwLock<String>,

    /// Payloads by canonical address
    payloads: RwLock<HashMap<CanonicalKey, Payload>>,

    /// Answers for other in-page expressions
    probes: RwLock<HashMap<String, Value>>,

    /// Bytes served by `fetch`
    resources: RwLock<HashMap<String, Vec<u8>>>,

    /// Human input not yet drained
    input: RwLock<Vec<InputKind>>,

    latency: RwLock<Duration>,
    failing: AtomicBool,

    /// Call history
    calls: RwLock<Vec<PageCall>>,
}

/// Record of a call made to a [`ScriptedPage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCall {
    Address,
    Evaluate { expression: String },
    Fetch { url: String },
    DrainInput,
}

// Every critical section is a single read or write; a poisoned lock still
// holds consistent state.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedPage {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: RwLock::new(address.into()),
            payloads: RwLock::default(),
            probes: RwLock::default(),
            resources: RwLock::default(),
            input: RwLock::default(),
            latency: RwLock::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            calls: RwLock::default(),
        }
    }

    /// Navigate (or route-change) to another address.
    pub fn set_address(&self, address: impl Into<String>) {
        *write(&self.address) = address.into();
    }

    /// Script what the page shows at `address`.
    pub fn set_payload(&self, address: &str, payload: Payload) {
        write(&self.payloads).insert(canonicalize(address), payload);
    }

    pub fn remove_payload(&self, address: &str) {
        write(&self.payloads).remove(&canonicalize(address));
    }

    /// Answer `expression` with `value` from now on.
    pub fn set_probe(&self, expression: impl Into<String>, value: Value) {
        write(&self.probes).insert(expression.into(), value);
    }

    /// Serve `bytes` for `url`. Unknown urls answer 404.
    pub fn set_resource(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        write(&self.resources).insert(url.into(), bytes.into());
    }

    /// Queue human input for the next `drain_input`.
    pub fn push_input(&self, kind: InputKind) {
        write(&self.input).push(kind);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *write(&self.latency) = latency;
    }

    /// Make every call fail as if the page was disconnected.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all calls made to this page.
    pub fn calls(&self) -> Vec<PageCall> {
        read(&self.calls).clone()
    }

    /// Urls requested through `fetch`, in order.
    pub fn fetched(&self) -> Vec<String> {
        read(&self.calls)
            .iter()
            .filter_map(|call| match call {
                PageCall::Fetch { url } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        write(&self.calls).clear();
    }

    async fn enter(&self, call: PageCall) -> BrowserResult<()> {
        write(&self.calls).push(call);
        let latency = *read(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(BrowserError::Disconnected);
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserPage for ScriptedPage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn address(&self) -> BrowserResult<String> {
        self.enter(PageCall::Address).await?;
        Ok(read(&self.address).clone())
    }

    async fn evaluate(&self, expression: &str) -> BrowserResult<Value> {
        self.enter(PageCall::Evaluate {
            expression: expression.to_string(),
        })
        .await?;

        if expression == PAYLOAD_PROBE {
            let key = canonicalize(&read(&self.address));
            let payloads = read(&self.payloads);
            return match payloads.get(&key) {
                Some(payload) => serde_json::to_value(payload)
                    .map_err(|e| BrowserError::Evaluation(e.to_string())),
                None => Ok(Value::Null),
            };
        }

        Ok(read(&self.probes)
            .get(expression)
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn fetch(&self, url: &str) -> BrowserResult<Vec<u8>> {
        self.enter(PageCall::Fetch {
            url: url.to_string(),
        })
        .await?;
        read(&self.resources)
            .get(url)
            .cloned()
            .ok_or_else(|| BrowserError::Fetch {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            })
    }

    async fn drain_input(&self) -> BrowserResult<Vec<InputKind>> {
        self.enter(PageCall::DrainInput).await?;
        Ok(std::mem::take(&mut *write(&self.input)))
    }
}

/// Read the scripted payload for the page's current address.
pub(crate) async fn read_payload(page: &PageHandle) -> HarvestResult<Payload> {
    let payload: Option<Payload> = page.evaluate_as(PAYLOAD_PROBE).await?;
    match payload {
        Some(payload) => Ok(payload),
        None => Err(HarvestError::Extraction {
            address: page.address().await?,
            reason: "no payload rendered".to_string(),
        }),
    }
}

/// Extractor that takes whatever [`PAYLOAD_PROBE`] returns.
///
/// Quick checks use the same read, so they fingerprint identically to full
/// extractions.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageExtractor;

#[async_trait]
impl Extractor for PageExtractor {
    async fn extract(&self, _category: ResourceCategory, page: &PageHandle) -> HarvestResult<Payload> {
        read_payload(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::payload::DetailPayload;
    use std::sync::Arc;

    #[tokio::test]
    async fn payloads_follow_the_current_address() {
        let page = Arc::new(ScriptedPage::new("tab", "https://example.com/product-details?b=2&a=1"));
        page.set_payload(
            "https://example.com/product-details?a=1&b=2",
            Payload::Detail(DetailPayload {
                project_name: "Widget".to_string(),
                ..Default::default()
            }),
        );
        let handle = PageHandle::new(page.clone(), Duration::from_secs(5));

        let payload = PageExtractor
            .extract(ResourceCategory::DetailPage, &handle)
            .await
            .unwrap();
        assert_eq!(payload.category(), ResourceCategory::DetailPage);

        page.set_address("https://example.com/product-details?a=3");
        let err = PageExtractor
            .extract(ResourceCategory::DetailPage, &handle)
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Extraction { .. }));
    }

    #[tokio::test]
    async fn unknown_resources_answer_not_found() {
        let page = ScriptedPage::new("tab", "https://example.com/");
        page.set_resource("https://cdn.example.com/a.svg", "<svg/>");

        assert_eq!(page.fetch("https://cdn.example.com/a.svg").await.unwrap(), b"<svg/>");
        let err = page.fetch("https://cdn.example.com/b.svg").await.unwrap_err();
        assert!(matches!(err, BrowserError::Fetch { .. }));
        assert_eq!(
            page.fetched(),
            vec!["https://cdn.example.com/a.svg", "https://cdn.example.com/b.svg"]
        );
    }
}
