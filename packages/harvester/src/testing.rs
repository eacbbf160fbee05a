//! Testing utilities including mock implementations.
//!
//! These are useful for exercising the orchestrator without a live browser:
//! [`MockExtractor`] reads payloads from a [`ScriptedPage`] while tracking
//! calls, and [`MemorySink`] keeps everything it is asked to persist.
//!
//! [`ScriptedPage`]: crate::scripted::ScriptedPage

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::error::{HarvestError, HarvestResult};
use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::page::PageHandle;
use crate::scripted::read_payload;
use crate::traits::{
    extractor::Extractor,
    sink::{Collected, CollectionSink},
};
use crate::types::{category::ResourceCategory, payload::Payload};

/// A [`PageExtractor`](crate::scripted::PageExtractor) with call tracking,
/// latency and failure injection.
#[derive(Default)]
pub struct MockExtractor {
    /// Time spent in every full extraction
    delay: Duration,

    /// Full extractions that still have to fail
    extract_failures: AtomicUsize,

    /// Quick checks that still have to fail
    quick_check_failures: AtomicUsize,

    /// Call tracking for assertions
    calls: Arc<RwLock<Vec<MockExtractorCall>>>,
}

/// Record of a call made to the mock extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockExtractorCall {
    Extract {
        category: ResourceCategory,
        address: String,
    },
    QuickCheck {
        category: ResourceCategory,
        address: String,
    },
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every full extraction take `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the next `count` full extractions.
    pub fn fail_next_extractions(&self, count: usize) {
        self.extract_failures.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` quick checks.
    pub fn fail_next_quick_checks(&self, count: usize) {
        self.quick_check_failures.store(count, Ordering::SeqCst);
    }

    /// Get all calls made to this mock.
    pub fn calls(&self) -> Vec<MockExtractorCall> {
        self.calls.read().unwrap().clone()
    }

    /// Number of full extractions started.
    pub fn extractions(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockExtractorCall::Extract { .. }))
            .count()
    }

    /// Number of quick checks started.
    pub fn quick_checks(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, MockExtractorCall::QuickCheck { .. }))
            .count()
    }

    /// Clear call history.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap().clear();
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Extractor for MockExtractor {
    async fn extract(&self, category: ResourceCategory, page: &PageHandle) -> HarvestResult<Payload> {
        let address = page.address().await.unwrap_or_default();
        self.calls.write().unwrap().push(MockExtractorCall::Extract {
            category,
            address: address.clone(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if Self::take_failure(&self.extract_failures) {
            return Err(HarvestError::Extraction {
                address,
                reason: "injected failure".to_string(),
            });
        }
        read_payload(page).await
    }

    async fn quick_check(
        &self,
        category: ResourceCategory,
        page: &PageHandle,
    ) -> HarvestResult<Payload> {
        let address = page.address().await.unwrap_or_default();
        self.calls.write().unwrap().push(MockExtractorCall::QuickCheck {
            category,
            address: address.clone(),
        });

        if Self::take_failure(&self.quick_check_failures) {
            return Err(HarvestError::Extraction {
                address,
                reason: "injected quick check failure".to_string(),
            });
        }
        read_payload(page).await
    }
}

/// Owned copy of a [`Collected`] value.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCollection {
    pub category: ResourceCategory,
    pub key: CanonicalKey,
    pub address: String,
    pub fingerprint: Fingerprint,
    pub payload: Payload,
    pub warnings: Vec<String>,
    pub recollection: bool,
}

/// Sink that keeps every persisted payload in memory.
#[derive(Default)]
pub struct MemorySink {
    stored: Arc<RwLock<Vec<StoredCollection>>>,
    failing: AtomicBool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every payload until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn collected(&self) -> Vec<StoredCollection> {
        self.stored.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.stored.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CollectionSink for MemorySink {
    async fn persist(&self, collected: Collected<'_>) -> HarvestResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HarvestError::Persistence(Box::new(std::io::Error::other(
                "sink unavailable",
            ))));
        }
        self.stored.write().unwrap().push(StoredCollection {
            category: collected.category,
            key: collected.key.clone(),
            address: collected.address.to_string(),
            fingerprint: collected.fingerprint,
            payload: collected.payload.clone(),
            warnings: collected.warnings.to_vec(),
            recollection: collected.recollection,
        });
        Ok(())
    }
}
