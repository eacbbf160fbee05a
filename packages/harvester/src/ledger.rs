//! The collection ledger: what has been collected, and what it looked like.
//!
//! Two tables per category:
//!
//! - `records`: keys that were fully collected, with their last fingerprint
//!   and collection time. Membership answers [`has_collected`].
//! - `fingerprints`: last-known fingerprint per key, advanced by both
//!   [`record`] and [`changed`]. This is the change-detection oracle.
//!
//! [`changed`] baselines on first sight and compare-and-updates afterwards,
//! so racing signal sources that observe the same change see `true` once.
//!
//! [`has_collected`]: CollectionLedger::has_collected
//! [`record`]: CollectionLedger::record
//! [`changed`]: CollectionLedger::changed

use chrono::Utc;
use std::collections::HashMap;

use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;
use crate::types::record::{CollectionRecord, LedgerSnapshot};

#[derive(Debug, Default)]
struct CategoryLedger {
    records: HashMap<CanonicalKey, CollectionRecord>,
    fingerprints: HashMap<CanonicalKey, Fingerprint>,
}

/// Per-category memory of collected resources.
#[derive(Debug, Default)]
pub struct CollectionLedger {
    categories: HashMap<ResourceCategory, CategoryLedger>,
}

impl CollectionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger from a previous run.
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let mut ledger = Self::new();
        for record in snapshot.records {
            let table = ledger.categories.entry(record.category).or_default();
            table
                .fingerprints
                .insert(record.key.clone(), record.fingerprint);
            table.records.insert(record.key.clone(), record);
        }
        ledger
    }

    pub fn has_collected(&self, category: ResourceCategory, key: &CanonicalKey) -> bool {
        self.categories
            .get(&category)
            .is_some_and(|table| table.records.contains_key(key))
    }

    /// Insert or overwrite the record for `(category, key)`.
    pub fn record(
        &mut self,
        category: ResourceCategory,
        key: &CanonicalKey,
        fingerprint: Fingerprint,
    ) -> CollectionRecord {
        let table = self.categories.entry(category).or_default();
        table.fingerprints.insert(key.clone(), fingerprint);

        let now = Utc::now();
        let record = table
            .records
            .entry(key.clone())
            .and_modify(|existing| {
                existing.fingerprint = fingerprint;
                existing.collected_at = now;
                existing.collections += 1;
            })
            .or_insert_with(|| CollectionRecord {
                category,
                key: key.clone(),
                fingerprint,
                collected_at: now,
                collections: 1,
            });
        record.clone()
    }

    /// Compare-and-update the last-known fingerprint.
    ///
    /// Returns false the first time a key is seen (baseline only) and
    /// whenever the fingerprint matches; true when it differs. Always stores
    /// `fingerprint`.
    pub fn changed(
        &mut self,
        category: ResourceCategory,
        key: &CanonicalKey,
        fingerprint: Fingerprint,
    ) -> bool {
        let table = self.categories.entry(category).or_default();
        match table.fingerprints.insert(key.clone(), fingerprint) {
            Some(previous) => previous != fingerprint,
            None => false,
        }
    }

    /// Undo a [`changed`](Self::changed) whose re-collection failed.
    ///
    /// Only rewinds if nobody stored a newer fingerprint in between, so the
    /// change is reported again on the next quick check.
    pub(crate) fn revert_change(
        &mut self,
        category: ResourceCategory,
        key: &CanonicalKey,
        observed: Fingerprint,
        previous: Option<Fingerprint>,
    ) {
        let Some(table) = self.categories.get_mut(&category) else {
            return;
        };
        if table.fingerprints.get(key) != Some(&observed) {
            return;
        }
        match previous {
            Some(previous) => {
                table.fingerprints.insert(key.clone(), previous);
            }
            None => {
                table.fingerprints.remove(key);
            }
        }
    }

    pub fn get(&self, category: ResourceCategory, key: &CanonicalKey) -> Option<&CollectionRecord> {
        self.categories.get(&category)?.records.get(key)
    }

    pub fn last_fingerprint(
        &self,
        category: ResourceCategory,
        key: &CanonicalKey,
    ) -> Option<Fingerprint> {
        self.categories.get(&category)?.fingerprints.get(key).copied()
    }

    /// Number of collected resources across all categories.
    pub fn len(&self) -> usize {
        self.categories.values().map(|t| t.records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every record, ordered by category then key.
    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut records: Vec<CollectionRecord> = self
            .categories
            .values()
            .flat_map(|table| table.records.values().cloned())
            .collect();
        records.sort_by(|a, b| (a.category, &a.key).cmp(&(b.category, &b.key)));
        LedgerSnapshot {
            taken_at: Some(Utc::now()),
            records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::canonicalize;

    fn fp(byte: u8) -> Fingerprint {
        Fingerprint::from_bytes([byte; 16])
    }

    #[test]
    fn changed_baselines_then_compares() {
        let mut ledger = CollectionLedger::new();
        let key = canonicalize("https://example.com/chain-detail?id=1");
        let cat = ResourceCategory::DiagramPage;

        assert!(!ledger.changed(cat, &key, fp(1)), "first sight is a baseline");
        assert_eq!(ledger.last_fingerprint(cat, &key), Some(fp(1)));
        assert!(!ledger.changed(cat, &key, fp(1)));
        assert!(ledger.changed(cat, &key, fp(2)));
        assert!(!ledger.changed(cat, &key, fp(2)), "reported once per change");
        assert!(ledger.changed(cat, &key, fp(1)));
    }

    #[test]
    fn changed_does_not_mark_as_collected() {
        let mut ledger = CollectionLedger::new();
        let key = canonicalize("https://example.com/chain-detail?id=1");
        ledger.changed(ResourceCategory::DiagramPage, &key, fp(1));
        assert!(!ledger.has_collected(ResourceCategory::DiagramPage, &key));
    }

    #[test]
    fn record_is_idempotent_and_counts_collections() {
        let mut ledger = CollectionLedger::new();
        let key = canonicalize("https://example.com/chain-info?chain=ai");
        let cat = ResourceCategory::ListingPage;

        let first = ledger.record(cat, &key, fp(1));
        assert_eq!(first.collections, 1);
        assert!(ledger.has_collected(cat, &key));
        assert!(!ledger.has_collected(ResourceCategory::DetailPage, &key));

        let second = ledger.record(cat, &key, fp(2));
        assert_eq!(second.collections, 2);
        assert_eq!(second.fingerprint, fp(2));
        assert!(second.collected_at >= first.collected_at);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn record_refreshes_the_change_baseline() {
        let mut ledger = CollectionLedger::new();
        let key = canonicalize("https://example.com/chain-detail?id=1");
        let cat = ResourceCategory::DiagramPage;

        ledger.record(cat, &key, fp(7));
        assert!(!ledger.changed(cat, &key, fp(7)));
        assert!(ledger.changed(cat, &key, fp(8)));
    }

    #[test]
    fn reverted_change_is_reported_again() {
        let mut ledger = CollectionLedger::new();
        let key = canonicalize("https://example.com/chain-detail?id=1");
        let cat = ResourceCategory::DiagramPage;

        ledger.record(cat, &key, fp(1));
        assert!(ledger.changed(cat, &key, fp(2)));
        ledger.revert_change(cat, &key, fp(2), Some(fp(1)));
        assert!(ledger.changed(cat, &key, fp(2)));

        // A newer observation is never clobbered.
        assert!(ledger.changed(cat, &key, fp(3)));
        ledger.revert_change(cat, &key, fp(2), Some(fp(1)));
        assert_eq!(ledger.last_fingerprint(cat, &key), Some(fp(3)));
    }

    #[test]
    fn snapshot_round_trip_preserves_membership() {
        let mut ledger = CollectionLedger::new();
        let detail = canonicalize("https://example.com/product-details?id=9");
        let listing = canonicalize("https://example.com/chain-info?chain=ai");
        ledger.record(ResourceCategory::DetailPage, &detail, fp(3));
        ledger.record(ResourceCategory::ListingPage, &listing, fp(4));

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.records[0].category, ResourceCategory::ListingPage);

        let restored = CollectionLedger::from_snapshot(snapshot);
        assert!(restored.has_collected(ResourceCategory::DetailPage, &detail));
        assert_eq!(
            restored.last_fingerprint(ResourceCategory::ListingPage, &listing),
            Some(fp(4))
        );
    }
}
