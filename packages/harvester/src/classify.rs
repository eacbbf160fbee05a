//! Address → category classification.

use crate::error::{HarvestError, HarvestResult};
use crate::identifier::CanonicalKey;
use crate::types::category::ResourceCategory;
use crate::types::config::HarvestConfig;

/// Substring classifier built from the per-category patterns.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<(ResourceCategory, Vec<String>)>,
}

impl Classifier {
    pub fn new(config: &HarvestConfig) -> Self {
        let rules = ResourceCategory::COLLECTIBLE
            .into_iter()
            .filter_map(|category| {
                config
                    .category(category)
                    .map(|c| (category, c.patterns.clone()))
            })
            .collect();
        Self { rules }
    }

    /// Category of a canonical address.
    ///
    /// No match is [`ResourceCategory::Unclassified`]; matches in more than
    /// one category are [`HarvestError::ClassificationAmbiguous`].
    pub fn classify(&self, key: &CanonicalKey) -> HarvestResult<ResourceCategory> {
        let address = key.as_str();
        let matches: Vec<ResourceCategory> = self
            .rules
            .iter()
            .filter(|(_, patterns)| patterns.iter().any(|p| address.contains(p.as_str())))
            .map(|(category, _)| *category)
            .collect();

        match matches.as_slice() {
            [] => Ok(ResourceCategory::Unclassified),
            [single] => Ok(*single),
            _ => Err(HarvestError::ClassificationAmbiguous {
                address: address.to_string(),
                matches: matches.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }
}
