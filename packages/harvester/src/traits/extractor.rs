//! Category-specific extraction handlers.

use async_trait::async_trait;

use crate::error::HarvestResult;
use crate::page::PageHandle;
use crate::types::category::ResourceCategory;
use crate::types::payload::Payload;

/// Turns the current state of a page into a [`Payload`].
///
/// Handlers are pure with respect to orchestrator state: they read the page
/// and return data, they never touch the ledger or the gate.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Full extraction. May scroll, wait for lazy content and fetch
    /// embedded resources.
    async fn extract(&self, category: ResourceCategory, page: &PageHandle) -> HarvestResult<Payload>;

    /// Cheap, side-effect-light extraction used to detect change.
    ///
    /// Must fingerprint identically to [`Extractor::extract`] when the page
    /// has not meaningfully changed. Defaults to a full extraction.
    async fn quick_check(
        &self,
        category: ResourceCategory,
        page: &PageHandle,
    ) -> HarvestResult<Payload> {
        self.extract(category, page).await
    }
}
