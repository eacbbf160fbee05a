//! Incremental Collection Orchestrator
//!
//! Watches a live, human-driven browser session and collects structured data
//! from pages as they are visited, without a "scrape now" action and without
//! getting in the operator's way.
//!
//! # Design
//!
//! - Reactive: navigation events, DOM callbacks and polling watchers all
//!   become [`Signal`]s; the orchestrator never navigates on its own
//! - At most one collection runs at a time (the collection gate)
//! - Listing and detail pages are collected once; diagram pages are
//!   re-collected when a cheap quick check fingerprints differently
//! - The ledger only changes after the sink accepted a payload
//! - Per-resource failures are logged and retried by a later signal, never
//!   propagated
//!
//! # Usage
//!
//! ```rust,ignore
//! use harvester::{HarvestConfig, HarvestSession, JsonFileSink, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(
//!     HarvestConfig::default(),
//!     Arc::new(MyExtractor::new()),
//!     Arc::new(JsonFileSink::new("./harvest")),
//! )?;
//! let mut session = HarvestSession::start(orchestrator);
//! session.attach_page(page).await?;
//! ```
//!
//! # Modules
//!
//! - [`identifier`] - Address canonicalization
//! - [`fingerprint`] - Content digests for change detection
//! - [`interaction`] - Human activity tracking
//! - [`ledger`] - What was collected and what it looked like
//! - [`orchestrator`] - Signal handling state machine
//! - [`watchers`] - Polling watchers
//! - [`session`] - Signal loop plus watchers per page
//! - [`sinks`] - Persistence implementations
//! - [`traits`] - Browser, extractor and sink seams
//! - [`fetching`] - Extractor wrapper that downloads diagram sources
//! - [`scripted`] - Scripted pages for replaying recorded sessions
//! - [`testing`] - Mock collaborators

pub mod classify;
pub mod error;
pub mod fetching;
pub mod fingerprint;
pub(crate) mod gate;
pub mod identifier;
pub mod interaction;
pub mod ledger;
pub mod orchestrator;
pub mod page;
pub mod scripted;
pub mod session;
pub mod sinks;
pub mod testing;
pub mod traits;
pub mod types;
pub mod watchers;

// Re-export core types at crate root
pub use error::{BrowserError, BrowserResult, HarvestError, HarvestResult};
pub use fetching::FetchingExtractor;
pub use fingerprint::{fingerprint, Fingerprint};
pub use gate::GateClaim;
pub use identifier::{canonicalize, CanonicalKey};
pub use interaction::{InputKind, InteractionGuard};
pub use ledger::CollectionLedger;
pub use orchestrator::Orchestrator;
pub use page::PageHandle;
pub use session::{HarvestSession, SessionSummary};
pub use sinks::JsonFileSink;
pub use traits::{
    browser::BrowserPage,
    extractor::Extractor,
    sink::{Collected, CollectionSink},
};
pub use types::{
    category::{CollectionPolicy, InteractionPolicy, ResourceCategory},
    config::{CategoryConfig, HarvestConfig, WatcherConfig},
    outcome::{DropReason, HarvestStats, SignalOutcome, SkipReason},
    payload::{DetailPayload, DiagramElement, DiagramPayload, ListingItem, ListingPayload, Payload},
    record::{CollectionRecord, LedgerSnapshot},
    signal::{Signal, SignalId, SignalSource},
};
