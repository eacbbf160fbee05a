//! Resource categories and their collection policies.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of resource kinds the orchestrator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    /// Pages rendering a diagram (chain graphs, embedded SVG frames).
    DiagramPage,
    /// Tabular listings of items with links to their detail pages.
    ListingPage,
    /// A single item's detail record.
    DetailPage,
    /// Anything else. Never collected.
    Unclassified,
}

impl ResourceCategory {
    /// Every category that can be collected, in a stable order.
    pub const COLLECTIBLE: [ResourceCategory; 3] = [
        ResourceCategory::DiagramPage,
        ResourceCategory::ListingPage,
        ResourceCategory::DetailPage,
    ];

    pub fn is_collectible(self) -> bool {
        !matches!(self, ResourceCategory::Unclassified)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceCategory::DiagramPage => "diagram_page",
            ResourceCategory::ListingPage => "listing_page",
            ResourceCategory::DetailPage => "detail_page",
            ResourceCategory::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How often a resource in a category may be collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionPolicy {
    /// Collected a single time for the life of the ledger.
    AtMostOnce,
    /// Re-collected whenever a quick check reports a changed fingerprint.
    Recollectible,
}

/// What to do when the operator is active at collection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionPolicy {
    /// Log a warning and collect anyway.
    WarnAndProceed,
    /// Suspend until the quiet period elapses, then re-evaluate.
    WaitForQuiet,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclassified_is_the_only_uncollectible_category() {
        assert!(!ResourceCategory::Unclassified.is_collectible());
        for category in ResourceCategory::COLLECTIBLE {
            assert!(category.is_collectible());
        }
    }

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ResourceCategory::ListingPage).unwrap();
        assert_eq!(json, "\"listing_page\"");
        assert_eq!(ResourceCategory::ListingPage.to_string(), "listing_page");
    }
}
