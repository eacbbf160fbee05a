//! Process-wide collection gate.
//!
//! At most one full collection runs at any instant. The holder is published
//! on a `watch` channel: acquisition is a compare-and-set on the channel's
//! value, and waiters subscribe and wait for the slot to empty. Release is
//! tied to [`GatePermit`]'s drop, so a cancelled collection still frees the
//! gate.

use std::fmt;
use tokio::sync::watch;

use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;

/// Who is (or wants to be) collecting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GateClaim {
    pub category: ResourceCategory,
    pub key: CanonicalKey,
}

impl GateClaim {
    pub fn new(category: ResourceCategory, key: CanonicalKey) -> Self {
        Self { category, key }
    }
}

impl fmt::Display for GateClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.key)
    }
}

pub(crate) struct CollectionGate {
    holder: watch::Sender<Option<GateClaim>>,
}

impl CollectionGate {
    pub(crate) fn new() -> Self {
        let (holder, _) = watch::channel(None);
        Self { holder }
    }

    pub(crate) fn holder(&self) -> Option<GateClaim> {
        self.holder.borrow().clone()
    }

    pub(crate) fn is_held(&self) -> bool {
        self.holder.borrow().is_some()
    }

    /// Take the gate for `claim`, or report who holds it.
    pub(crate) fn try_acquire(&self, claim: &GateClaim) -> Result<GatePermit<'_>, GateClaim> {
        let mut current = None;
        let acquired = self.holder.send_if_modified(|slot| match slot {
            Some(held) => {
                current = Some(held.clone());
                false
            }
            None => {
                *slot = Some(claim.clone());
                true
            }
        });

        if acquired {
            Ok(GatePermit { gate: self })
        } else {
            // `current` is always set when the slot was occupied.
            Err(current.unwrap_or_else(|| claim.clone()))
        }
    }

    /// Suspend until nobody holds the gate.
    pub(crate) async fn released(&self) {
        let mut rx = self.holder.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(Option::is_none).await;
    }
}

/// Proof of holding the gate; releases on drop.
pub(crate) struct GatePermit<'a> {
    gate: &'a CollectionGate,
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.holder.send_replace(None);
    }
}
