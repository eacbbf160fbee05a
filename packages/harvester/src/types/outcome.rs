//! What the orchestrator did with a signal, and running totals.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::fingerprint::Fingerprint;
use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;

/// Why a signal was dropped before any ledger lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    Unclassified,
    Ambiguous,
    /// The same resource is being collected right now.
    AlreadyInProgress,
}

/// Why a classified signal led to no full extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// At-most-once category, already in the ledger.
    AlreadyCollected,
    /// Quick check fingerprint matched the ledger.
    Unchanged,
    /// Quick check could not run; treated as unchanged.
    QuickCheckFailed,
}

/// Result of handling one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    Dropped(DropReason),
    Skipped {
        category: ResourceCategory,
        key: CanonicalKey,
        reason: SkipReason,
    },
    Collected {
        category: ResourceCategory,
        key: CanonicalKey,
        fingerprint: Fingerprint,
        recollection: bool,
        partial: bool,
    },
    Failed {
        category: ResourceCategory,
        key: CanonicalKey,
        error: String,
    },
}

impl SignalOutcome {
    pub fn is_collected(&self) -> bool {
        matches!(self, SignalOutcome::Collected { .. })
    }
}

/// Counters over every handled signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestStats {
    pub signals: u64,
    pub dropped: u64,
    pub skipped: u64,
    pub collected: u64,
    pub recollected: u64,
    pub partial: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    signals: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
    collected: AtomicU64,
    recollected: AtomicU64,
    partial: AtomicU64,
    failed: AtomicU64,
}

impl StatsCounter {
    pub(crate) fn observe(&self, outcome: &SignalOutcome) {
        self.signals.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            SignalOutcome::Dropped(_) => &self.dropped,
            SignalOutcome::Skipped { .. } => &self.skipped,
            SignalOutcome::Collected {
                recollection,
                partial,
                ..
            } => {
                if *partial {
                    self.partial.fetch_add(1, Ordering::Relaxed);
                }
                if *recollection {
                    &self.recollected
                } else {
                    &self.collected
                }
            }
            SignalOutcome::Failed { .. } => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HarvestStats {
        HarvestStats {
            signals: self.signals.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            collected: self.collected.load(Ordering::Relaxed),
            recollected: self.recollected.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
