//! Raw signals fed to the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::traits::browser::BrowserPage;

/// Where a signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// Main-frame navigation reported by the browser.
    Navigation,
    /// DOM-mutation or load callback from an in-page hook.
    DomMutation,
    /// Address polling noticed a route change.
    AddressPoll,
    /// The attribute probe returned a new value.
    AttributeChange,
    /// Periodic re-check of a collected re-collectible resource.
    RefreshTick,
}

impl fmt::Display for SignalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalSource::Navigation => "navigation",
            SignalSource::DomMutation => "dom_mutation",
            SignalSource::AddressPoll => "address_poll",
            SignalSource::AttributeChange => "attribute_change",
            SignalSource::RefreshTick => "refresh_tick",
        };
        f.write_str(name)
    }
}

/// Correlation id for log lines about one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId(pub Uuid);

impl SignalId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SignalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// "Something happened on this page at this address."
#[derive(Clone)]
pub struct Signal {
    pub id: SignalId,
    pub source: SignalSource,
    pub address: String,
    pub page: Arc<dyn BrowserPage>,
}

impl Signal {
    pub fn new(source: SignalSource, address: impl Into<String>, page: Arc<dyn BrowserPage>) -> Self {
        Self {
            id: SignalId::new(),
            source,
            address: address.into(),
            page,
        }
    }

    pub fn navigation(address: impl Into<String>, page: Arc<dyn BrowserPage>) -> Self {
        Self::new(SignalSource::Navigation, address, page)
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("address", &self.address)
            .field("page", &self.page.id())
            .finish()
    }
}
