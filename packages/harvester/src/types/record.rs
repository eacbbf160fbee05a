//! Ledger records and snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{HarvestError, HarvestResult};
use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;

/// One successfully collected resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub category: ResourceCategory,
    pub key: CanonicalKey,
    pub fingerprint: Fingerprint,
    /// Time of the most recent full collection.
    pub collected_at: DateTime<Utc>,
    /// Number of full collections so far (1 on first collection).
    #[serde(default = "one")]
    pub collections: u32,
}

fn one() -> u32 {
    1
}

/// Serializable copy of a ledger, used to seed a later process.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub taken_at: Option<DateTime<Utc>>,
    pub records: Vec<CollectionRecord>,
}

impl LedgerSnapshot {
    /// Read a snapshot written by [`LedgerSnapshot::save`].
    pub async fn load(path: impl AsRef<Path>) -> HarvestResult<Self> {
        let bytes = tokio::fs::read(path.as_ref())
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Read a snapshot if the file exists, otherwise start empty.
    pub async fn load_or_default(path: impl AsRef<Path>) -> HarvestResult<Self> {
        match tokio::fs::try_exists(path.as_ref()).await {
            Ok(true) => Self::load(path).await,
            Ok(false) => Ok(Self::default()),
            Err(e) => Err(HarvestError::Persistence(Box::new(e))),
        }
    }

    /// Write the snapshot as pretty JSON, replacing any previous file.
    pub async fn save(&self, path: impl AsRef<Path>) -> HarvestResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        }

        let bytes = serde_json::to_vec_pretty(self)?;
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|e| HarvestError::Persistence(Box::new(e)))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records of one category.
    pub fn for_category(
        &self,
        category: ResourceCategory,
    ) -> impl Iterator<Item = &CollectionRecord> + '_ {
        self.records.iter().filter(move |r| r.category == category)
    }
}
