//! Persistence collaborator.

use async_trait::async_trait;

use crate::error::HarvestResult;
use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;
use crate::types::payload::Payload;

/// A payload that passed extraction and is about to be recorded.
#[derive(Debug, Clone, Copy)]
pub struct Collected<'a> {
    pub category: ResourceCategory,
    pub key: &'a CanonicalKey,
    /// Raw address the signal carried.
    pub address: &'a str,
    pub fingerprint: Fingerprint,
    pub payload: &'a Payload,
    /// Missing-field warnings from a partial extraction.
    pub warnings: &'a [String],
    /// True when this overwrites an earlier collection.
    pub recollection: bool,
}

/// Receives collected payloads. A failure keeps the resource unrecorded.
#[async_trait]
pub trait CollectionSink: Send + Sync {
    async fn persist(&self, collected: Collected<'_>) -> HarvestResult<()>;
}
