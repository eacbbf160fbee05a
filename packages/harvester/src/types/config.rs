//! Configuration types for the orchestrator and its watchers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{HarvestError, HarvestResult};
use crate::types::category::{CollectionPolicy, InteractionPolicy, ResourceCategory};

/// In-page probe for the diagram frame's source attribute.
pub const DEFAULT_ATTRIBUTE_PROBE: &str = "(() => { \
    const el = document.querySelector('object#svgframe'); \
    return el ? (el.getAttribute('data') || el.getAttribute('src')) : null; \
})()";

/// Top-level configuration for a harvest session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// How long after the last human input the operator counts as active.
    ///
    /// Default: 5 seconds.
    #[serde(with = "millis")]
    pub quiet_period: Duration,

    /// Upper bound for every single browser call.
    ///
    /// Default: 20 seconds.
    #[serde(with = "millis")]
    pub call_timeout: Duration,

    /// Capacity of the signal channel between hooks/watchers and the loop.
    pub signal_buffer: usize,

    /// Per-category policies.
    pub categories: CategoryTable,

    /// Polling watcher cadences.
    pub watchers: WatcherConfig,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(5),
            call_timeout: Duration::from_secs(20),
            signal_buffer: 256,
            categories: CategoryTable::default(),
            watchers: WatcherConfig::default(),
        }
    }
}

impl HarvestConfig {
    /// Create a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the quiet period.
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.quiet_period = quiet_period;
        self
    }

    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Replace the configuration of one category.
    pub fn with_category(mut self, category: ResourceCategory, config: CategoryConfig) -> Self {
        if let Some(slot) = self.categories.get_mut(category) {
            *slot = config;
        }
        self
    }

    /// Set the same settle delay on every category.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        for category in ResourceCategory::COLLECTIBLE {
            if let Some(slot) = self.categories.get_mut(category) {
                slot.settle_delay = delay;
            }
        }
        self
    }

    /// Set watcher cadences.
    pub fn with_watchers(mut self, watchers: WatcherConfig) -> Self {
        self.watchers = watchers;
        self
    }

    /// Policy for a category, `None` for [`ResourceCategory::Unclassified`].
    pub fn category(&self, category: ResourceCategory) -> Option<&CategoryConfig> {
        self.categories.get(category)
    }

    /// Reject configurations the orchestrator cannot honor.
    pub fn validate(&self) -> HarvestResult<()> {
        if self.call_timeout.is_zero() {
            return Err(HarvestError::config("call_timeout must be > 0"));
        }
        if self.signal_buffer == 0 {
            return Err(HarvestError::config("signal_buffer must be > 0"));
        }
        for category in ResourceCategory::COLLECTIBLE {
            let Some(config) = self.category(category) else {
                continue;
            };
            if config.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(HarvestError::config(format!(
                    "{category} has an empty address pattern"
                )));
            }
        }
        self.watchers.validate()
    }
}

/// Policy and matching rules for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub policy: CollectionPolicy,
    pub interaction: InteractionPolicy,

    /// Pause before a quick check or full extraction so the page can render.
    #[serde(with = "millis")]
    pub settle_delay: Duration,

    /// Substrings of the canonical address that select this category.
    pub patterns: Vec<String>,
}

impl CategoryConfig {
    pub fn new(policy: CollectionPolicy, patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            policy,
            interaction: InteractionPolicy::WarnAndProceed,
            settle_delay: Duration::from_secs(3),
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_interaction(mut self, interaction: InteractionPolicy) -> Self {
        self.interaction = interaction;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

/// One [`CategoryConfig`] per collectible category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    pub diagram_page: CategoryConfig,
    pub listing_page: CategoryConfig,
    pub detail_page: CategoryConfig,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            diagram_page: CategoryConfig::new(CollectionPolicy::Recollectible, ["/chain-detail"]),
            listing_page: CategoryConfig::new(CollectionPolicy::AtMostOnce, ["/chain-info"]),
            detail_page: CategoryConfig::new(CollectionPolicy::AtMostOnce, ["/product-details"]),
        }
    }
}

impl CategoryTable {
    pub fn get(&self, category: ResourceCategory) -> Option<&CategoryConfig> {
        match category {
            ResourceCategory::DiagramPage => Some(&self.diagram_page),
            ResourceCategory::ListingPage => Some(&self.listing_page),
            ResourceCategory::DetailPage => Some(&self.detail_page),
            ResourceCategory::Unclassified => None,
        }
    }

    pub fn get_mut(&mut self, category: ResourceCategory) -> Option<&mut CategoryConfig> {
        match category {
            ResourceCategory::DiagramPage => Some(&mut self.diagram_page),
            ResourceCategory::ListingPage => Some(&mut self.listing_page),
            ResourceCategory::DetailPage => Some(&mut self.detail_page),
            ResourceCategory::Unclassified => None,
        }
    }
}

/// Cadences for the polling watchers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Address polling (route changes without a navigation event).
    #[serde(with = "millis")]
    pub address_poll: Duration,

    /// In-page attribute probe polling.
    #[serde(with = "millis")]
    pub attribute_poll: Duration,

    /// Human input draining.
    #[serde(with = "millis")]
    pub input_poll: Duration,

    /// Re-check of collected re-collectible resources.
    #[serde(with = "millis")]
    pub refresh_interval: Duration,

    /// Pause after a failed poll before the next attempt.
    #[serde(with = "millis")]
    pub error_backoff: Duration,

    /// Expression evaluated by the attribute watcher. `None` disables it.
    pub attribute_probe: Option<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            address_poll: Duration::from_millis(500),
            attribute_poll: Duration::from_millis(200),
            input_poll: Duration::from_millis(200),
            refresh_interval: Duration::from_secs(30),
            error_backoff: Duration::from_secs(1),
            attribute_probe: Some(DEFAULT_ATTRIBUTE_PROBE.to_string()),
        }
    }
}

impl WatcherConfig {
    fn validate(&self) -> HarvestResult<()> {
        let cadences = [
            ("address_poll", self.address_poll),
            ("attribute_poll", self.attribute_poll),
            ("input_poll", self.input_poll),
            ("refresh_interval", self.refresh_interval),
        ];
        for (name, cadence) in cadences {
            if cadence.is_zero() {
                return Err(HarvestError::config(format!("{name} must be > 0")));
            }
        }
        Ok(())
    }
}

/// Durations travel as integer milliseconds.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
