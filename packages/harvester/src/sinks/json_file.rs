//! File-backed sink: `<root>/<category>/<stem>.json`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{HarvestError, HarvestResult};
use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::traits::sink::{Collected, CollectionSink};
use crate::types::category::ResourceCategory;
use crate::types::payload::Payload;

const MAX_SLUG_LEN: usize = 80;

/// Header of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub category: ResourceCategory,
    pub key: CanonicalKey,
    pub fingerprint: Fingerprint,
    pub persisted_at: DateTime<Utc>,
    pub recollection: bool,
}

/// What [`JsonFileSink`] writes for each collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub record: StoredRecord,
    pub address: String,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub payload: Payload,
}

/// Writes every collected payload as pretty JSON under a root directory.
///
/// Re-collections overwrite the previous file for the same key.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    root: PathBuf,
}

impl JsonFileSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the document for `(category, key)` lives.
    pub fn path_for(&self, category: ResourceCategory, key: &CanonicalKey) -> PathBuf {
        self.root
            .join(category.as_str())
            .join(format!("{}.json", file_stem(key)))
    }

    /// Read back a stored document.
    pub async fn load(&self, category: ResourceCategory, key: &CanonicalKey) -> HarvestResult<StoredDocument> {
        let bytes = tokio::fs::read(self.path_for(category, key))
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl CollectionSink for JsonFileSink {
    async fn persist(&self, collected: Collected<'_>) -> HarvestResult<()> {
        let document = StoredDocument {
            record: StoredRecord {
                category: collected.category,
                key: collected.key.clone(),
                fingerprint: collected.fingerprint,
                persisted_at: Utc::now(),
                recollection: collected.recollection,
            },
            address: collected.address.to_string(),
            warnings: collected.warnings.to_vec(),
            payload: collected.payload.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;

        let path = self.path_for(collected.category, collected.key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;

        debug!(path = %path.display(), "payload written");
        Ok(())
    }
}

/// Readable, filesystem-safe and unique per key.
fn file_stem(key: &CanonicalKey) -> String {
    let stripped = key
        .as_str()
        .split_once("://")
        .map_or(key.as_str(), |(_, rest)| rest);

    let mut slug = String::with_capacity(MAX_SLUG_LEN);
    let mut last_was_sep = true;
    for c in stripped.chars() {
        if slug.len() >= MAX_SLUG_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let slug = slug.trim_end_matches('_');

    let digest = Sha256::digest(key.as_str().as_bytes());
    let suffix = &hex::encode(digest)[..8];
    if slug.is_empty() {
        suffix.to_string()
    } else {
        format!("{slug}-{suffix}")
    }
}
