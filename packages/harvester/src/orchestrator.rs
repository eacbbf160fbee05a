//! The collection orchestrator.
//!
//! Every raw signal (navigation, DOM mutation, watcher tick) goes through
//! [`Orchestrator::handle_signal`], which decides between dropping it,
//! skipping it, or running exactly one collection for it:
//!
//! 1. canonicalize and classify the address, drop `Unclassified`/ambiguous;
//! 2. if the gate is held for the same resource, drop; if held for another
//!    resource, wait for release and start over;
//! 3. at-most-once resources already in the ledger are skipped without any
//!    extractor call;
//! 4. re-collectible resources already in the ledger get a quick check, and
//!    are skipped unless the fingerprint changed;
//! 5. otherwise take the gate, run the full extraction, persist through the
//!    sink and only then record in the ledger.
//!
//! Per-resource failures are logged and reported as [`SignalOutcome::Failed`];
//! they never leave the signal loop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::classify::Classifier;
use crate::error::{HarvestError, HarvestResult};
use crate::fingerprint::{fingerprint, Fingerprint};
use crate::gate::{CollectionGate, GateClaim};
use crate::identifier::{canonicalize, CanonicalKey};
use crate::interaction::InteractionGuard;
use crate::ledger::CollectionLedger;
use crate::page::PageHandle;
use crate::traits::extractor::Extractor;
use crate::traits::sink::{Collected, CollectionSink};
use crate::types::category::{CollectionPolicy, InteractionPolicy, ResourceCategory};
use crate::types::config::{CategoryConfig, HarvestConfig};
use crate::types::outcome::{DropReason, HarvestStats, SignalOutcome, SkipReason, StatsCounter};
use crate::types::record::{CollectionRecord, LedgerSnapshot};
use crate::types::signal::Signal;

/// Owns the ledger and the gate, and drives extractors and the sink.
pub struct Orchestrator {
    config: HarvestConfig,
    classifier: Classifier,
    extractor: Arc<dyn Extractor>,
    sink: Arc<dyn CollectionSink>,
    guard: Arc<InteractionGuard>,
    ledger: Mutex<CollectionLedger>,
    gate: CollectionGate,
    stats: StatsCounter,
}

impl Orchestrator {
    /// Build an orchestrator with an empty ledger.
    pub fn new(
        config: HarvestConfig,
        extractor: Arc<dyn Extractor>,
        sink: Arc<dyn CollectionSink>,
    ) -> HarvestResult<Self> {
        config.validate()?;
        Ok(Self {
            classifier: Classifier::new(&config),
            guard: Arc::new(InteractionGuard::new(config.quiet_period)),
            config,
            extractor,
            sink,
            ledger: Mutex::new(CollectionLedger::new()),
            gate: CollectionGate::new(),
            stats: StatsCounter::default(),
        })
    }

    /// Seed the ledger from a previous run.
    pub fn with_ledger(self, snapshot: LedgerSnapshot) -> Self {
        info!(records = snapshot.len(), "seeding ledger from snapshot");
        *self.ledger() = CollectionLedger::from_snapshot(snapshot);
        self
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Shared with the interaction watcher and any in-page input hook.
    pub fn guard(&self) -> &Arc<InteractionGuard> {
        &self.guard
    }

    /// True while any collection holds the gate.
    pub fn is_collecting(&self) -> bool {
        self.gate.is_held()
    }

    /// Canonical key and category of a raw address.
    pub fn resolve(&self, address: &str) -> HarvestResult<(ResourceCategory, CanonicalKey)> {
        let key = canonicalize(address);
        let category = self.classifier.classify(&key)?;
        Ok((category, key))
    }

    pub fn has_collected(&self, category: ResourceCategory, key: &CanonicalKey) -> bool {
        self.ledger().has_collected(category, key)
    }

    pub fn record(&self, category: ResourceCategory, key: &CanonicalKey) -> Option<CollectionRecord> {
        self.ledger().get(category, key).cloned()
    }

    /// Whether the refresh watcher should re-check this address.
    pub fn is_refresh_candidate(&self, address: &str) -> bool {
        let Ok((category, key)) = self.resolve(address) else {
            return false;
        };
        let recollectible = self
            .config
            .category(category)
            .is_some_and(|c| c.policy == CollectionPolicy::Recollectible);
        recollectible && self.has_collected(category, &key)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.ledger().snapshot()
    }

    pub fn stats(&self) -> HarvestStats {
        self.stats.snapshot()
    }

    /// Decide and (maybe) run the collection for one signal.
    pub async fn handle_signal(&self, signal: Signal) -> SignalOutcome {
        let span = info_span!(
            "signal",
            id = %signal.id,
            source = %signal.source,
            page = signal.page.id()
        );
        let outcome = self.process(signal).instrument(span).await;
        self.stats.observe(&outcome);
        outcome
    }

    /// Consume signals until the channel closes or `cancel` fires.
    ///
    /// Each signal is handled on its own task so a long collection does not
    /// hold up gate bookkeeping for the next one. On cancellation in-flight
    /// work is aborted; gate permits release on drop and the ledger only
    /// changes at commit points.
    pub async fn run(
        self: Arc<Self>,
        mut signals: mpsc::Receiver<Signal>,
        cancel: CancellationToken,
    ) -> HarvestStats {
        let mut inflight = JoinSet::new();
        info!("signal loop started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(joined) = inflight.join_next(), if !inflight.is_empty() => {
                    log_join(joined);
                }
                received = signals.recv() => match received {
                    Some(signal) => {
                        let this = Arc::clone(&self);
                        inflight.spawn(async move { this.handle_signal(signal).await });
                    }
                    None => {
                        debug!("signal channel closed, draining in-flight work");
                        break;
                    }
                },
            }
        }

        while !inflight.is_empty() && !cancel.is_cancelled() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                joined = inflight.join_next() => match joined {
                    Some(joined) => log_join(joined),
                    None => break,
                },
            }
        }
        inflight.shutdown().await;

        let stats = self.stats();
        info!(
            signals = stats.signals,
            collected = stats.collected,
            recollected = stats.recollected,
            skipped = stats.skipped,
            dropped = stats.dropped,
            failed = stats.failed,
            "signal loop stopped"
        );
        stats
    }

    async fn process(&self, signal: Signal) -> SignalOutcome {
        let key = canonicalize(&signal.address);
        let category = match self.classifier.classify(&key) {
            Ok(ResourceCategory::Unclassified) => {
                debug!(key = %key, "unclassified address, dropping");
                return SignalOutcome::Dropped(DropReason::Unclassified);
            }
            Ok(category) => category,
            Err(e) => {
                debug!(error = %e, "ambiguous address, dropping");
                return SignalOutcome::Dropped(DropReason::Ambiguous);
            }
        };
        let Some(policy) = self.config.category(category).cloned() else {
            return SignalOutcome::Dropped(DropReason::Unclassified);
        };

        let claim = GateClaim::new(category, key.clone());
        let page = PageHandle::new(Arc::clone(&signal.page), self.config.call_timeout);

        let recollection = match self.admit(&claim, &policy).await {
            Ok(recollection) => recollection,
            Err(outcome) => return outcome,
        };

        let mut pending_change = None;
        if recollection {
            tokio::time::sleep(policy.settle_delay).await;
            match self.confirm_change(&claim, &page).await {
                Ok(change) => pending_change = Some(change),
                Err(outcome) => return outcome,
            }
        }

        // Take the gate. Between admission and here another signal may have
        // claimed it; same resource means that signal does the work.
        let permit = loop {
            match self.gate.try_acquire(&claim) {
                Ok(permit) => break permit,
                Err(holder) if holder == claim => {
                    // The holder may have extracted before this change and
                    // may still fail; leave the change for a later check.
                    if let Some((observed, previous)) = pending_change {
                        self.ledger()
                            .revert_change(category, &key, observed, previous);
                    }
                    debug!(key = %key, "same resource started collecting meanwhile");
                    return SignalOutcome::Dropped(DropReason::AlreadyInProgress);
                }
                Err(holder) => {
                    debug!(holder = %holder, "gate taken meanwhile, waiting");
                    self.gate.released().await;
                }
            }
        };

        if !recollection && self.has_collected(category, &key) {
            debug!(key = %key, "collected by another signal while waiting");
            return self.skipped(claim, SkipReason::AlreadyCollected);
        }

        if !recollection {
            tokio::time::sleep(policy.settle_delay).await;
        }

        info!(category = %category, key = %key, recollection, "collecting");
        let result = self
            .collect(&claim, &signal.address, &page, recollection)
            .await;
        drop(permit);

        match result {
            Ok((fingerprint, record, partial)) => {
                info!(
                    category = %category,
                    key = %key,
                    fingerprint = %fingerprint.short(),
                    collections = record.collections,
                    partial,
                    "collected"
                );
                SignalOutcome::Collected {
                    category,
                    key,
                    fingerprint,
                    recollection,
                    partial,
                }
            }
            Err(e) => {
                if let Some((observed, previous)) = pending_change {
                    self.ledger()
                        .revert_change(category, &key, observed, previous);
                }
                warn!(
                    category = %category,
                    key = %key,
                    error = %e,
                    transient = e.is_transient(),
                    "collection failed, will retry on a later signal"
                );
                SignalOutcome::Failed {
                    category,
                    key,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Gate, ledger and operator checks before any extractor call.
    ///
    /// Returns whether the resource was collected before, or the final
    /// outcome when the signal stops here.
    async fn admit(
        &self,
        claim: &GateClaim,
        policy: &CategoryConfig,
    ) -> Result<bool, SignalOutcome> {
        loop {
            match self.gate.holder() {
                Some(holder) if holder == *claim => {
                    debug!(key = %claim.key, "already collecting this resource, dropping");
                    return Err(SignalOutcome::Dropped(DropReason::AlreadyInProgress));
                }
                Some(holder) => {
                    debug!(holder = %holder, "another collection in progress, waiting");
                    self.gate.released().await;
                    continue;
                }
                None => {}
            }

            let collected = self.has_collected(claim.category, &claim.key);
            if collected && policy.policy == CollectionPolicy::AtMostOnce {
                debug!(key = %claim.key, "already collected");
                return Err(self.skipped(claim.clone(), SkipReason::AlreadyCollected));
            }

            let now = Instant::now();
            if self.guard.is_active(now) {
                match policy.interaction {
                    InteractionPolicy::WaitForQuiet => {
                        if let Some(quiet_at) = self.guard.quiet_at(now) {
                            let wait = quiet_at.saturating_duration_since(now);
                            info!(key = %claim.key, wait = ?wait, "operator active, waiting for quiet");
                            tokio::time::sleep_until(quiet_at).await;
                        }
                        continue;
                    }
                    InteractionPolicy::WarnAndProceed => {
                        warn!(key = %claim.key, "operator active, collecting anyway");
                    }
                }
            }

            return Ok(collected);
        }
    }

    /// Quick check for a collected re-collectible resource.
    ///
    /// On a confirmed change returns the observed and previous fingerprints
    /// so a failed re-collection can rewind the baseline.
    async fn confirm_change(
        &self,
        claim: &GateClaim,
        page: &PageHandle,
    ) -> Result<(Fingerprint, Option<Fingerprint>), SignalOutcome> {
        let payload = match self.extractor.quick_check(claim.category, page).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key = %claim.key, error = %e, "quick check failed");
                return Err(self.skipped(claim.clone(), SkipReason::QuickCheckFailed));
            }
        };

        let observed = fingerprint(&payload);
        let mut ledger = self.ledger();
        let previous = ledger.last_fingerprint(claim.category, &claim.key);
        if !ledger.changed(claim.category, &claim.key, observed) {
            drop(ledger);
            debug!(key = %claim.key, fingerprint = %observed.short(), "unchanged");
            return Err(self.skipped(claim.clone(), SkipReason::Unchanged));
        }
        drop(ledger);

        let was = previous.map(|fp| fp.short()).unwrap_or_default();
        info!(key = %claim.key, previous = %was, current = %observed.short(), "content changed");
        Ok((observed, previous))
    }

    /// Full extraction, persistence, then ledger commit. Caller holds the gate.
    async fn collect(
        &self,
        claim: &GateClaim,
        address: &str,
        page: &PageHandle,
        recollection: bool,
    ) -> HarvestResult<(Fingerprint, CollectionRecord, bool)> {
        let payload = self.extractor.extract(claim.category, page).await?;
        if payload.category() != claim.category {
            return Err(HarvestError::Extraction {
                address: address.to_string(),
                reason: format!(
                    "extractor returned a {} payload for a {} resource",
                    payload.category(),
                    claim.category
                ),
            });
        }

        let fingerprint = fingerprint(&payload);
        let warnings = payload.missing_fields();
        if !warnings.is_empty() {
            warn!(key = %claim.key, missing = ?warnings, "partial extraction");
        }

        self.sink
            .persist(Collected {
                category: claim.category,
                key: &claim.key,
                address,
                fingerprint,
                payload: &payload,
                warnings: &warnings,
                recollection,
            })
            .await?;

        let record = self.ledger().record(claim.category, &claim.key, fingerprint);
        Ok((fingerprint, record, !warnings.is_empty()))
    }

    fn skipped(&self, claim: GateClaim, reason: SkipReason) -> SignalOutcome {
        SignalOutcome::Skipped {
            category: claim.category,
            key: claim.key,
            reason,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, CollectionLedger> {
        // Mutations are single calls; a poisoned lock still holds a valid ledger.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn log_join(joined: Result<SignalOutcome, tokio::task::JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            error!(error = %e, "signal handler panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::ScriptedPage;
    use crate::testing::{MemorySink, MockExtractor};
    use crate::types::payload::{DetailPayload, Payload};
    use crate::types::signal::SignalSource;
    use std::time::Duration;

    const DETAIL: &str = "https://example.com/product-details?id=9";

    fn detail(name: &str) -> Payload {
        let mut payload = DetailPayload {
            project_name: name.to_string(),
            company_name: Some("Acme".to_string()),
            ..Default::default()
        };
        payload
            .attributes
            .insert("founded".to_string(), "2012".to_string());
        Payload::Detail(payload)
    }

    fn orchestrator(
        config: HarvestConfig,
    ) -> (Orchestrator, Arc<MockExtractor>, Arc<MemorySink>) {
        let extractor = Arc::new(MockExtractor::new());
        let sink = Arc::new(MemorySink::new());
        let orchestrator = Orchestrator::new(
            config.with_settle_delay(Duration::ZERO),
            extractor.clone(),
            sink.clone(),
        )
        .unwrap();
        (orchestrator, extractor, sink)
    }

    #[tokio::test]
    async fn unclassified_addresses_are_dropped() {
        let (orchestrator, extractor, _) = orchestrator(HarvestConfig::default());
        let page = Arc::new(ScriptedPage::new("tab", "https://example.com/industry-chain"));

        let outcome = orchestrator
            .handle_signal(Signal::navigation("https://example.com/industry-chain", page))
            .await;

        assert_eq!(outcome, SignalOutcome::Dropped(DropReason::Unclassified));
        assert!(extractor.calls().is_empty());
        assert_eq!(orchestrator.stats().dropped, 1);
    }

    #[tokio::test]
    async fn addresses_matching_several_categories_are_dropped() {
        let config = HarvestConfig::default().with_category(
            ResourceCategory::DetailPage,
            CategoryConfig::new(CollectionPolicy::AtMostOnce, ["/chain"]),
        );
        let (orchestrator, extractor, sink) = orchestrator(config);
        let address = "https://example.com/chain-info?chain=ai";
        let page = Arc::new(ScriptedPage::new("tab", address));
        page.set_payload(address, detail("Widget"));

        let outcome = orchestrator
            .handle_signal(Signal::new(SignalSource::DomMutation, address, page.clone()))
            .await;

        assert_eq!(outcome, SignalOutcome::Dropped(DropReason::Ambiguous));
        assert!(extractor.calls().is_empty());
        assert!(page.calls().is_empty());
        assert!(sink.is_empty());
        assert!(orchestrator.snapshot().is_empty());
        assert_eq!(orchestrator.stats().dropped, 1);
    }

    #[tokio::test]
    async fn signal_while_same_resource_is_collecting_is_dropped() {
        let (orchestrator, extractor, _) = orchestrator(HarvestConfig::default());
        let page = Arc::new(ScriptedPage::new("tab", DETAIL));
        page.set_payload(DETAIL, detail("Widget"));

        let (category, key) = orchestrator.resolve(DETAIL).unwrap();
        let claim = GateClaim::new(category, key);
        let _permit = orchestrator.gate.try_acquire(&claim).ok().unwrap();

        let outcome = orchestrator
            .handle_signal(Signal::new(SignalSource::DomMutation, DETAIL, page))
            .await;
        assert_eq!(outcome, SignalOutcome::Dropped(DropReason::AlreadyInProgress));
        assert!(extractor.calls().is_empty());
    }

    #[tokio::test]
    async fn sink_failure_leaves_the_resource_unrecorded() {
        let (orchestrator, _, sink) = orchestrator(HarvestConfig::default());
        let page = Arc::new(ScriptedPage::new("tab", DETAIL));
        page.set_payload(DETAIL, detail("Widget"));
        sink.set_failing(true);

        let outcome = orchestrator
            .handle_signal(Signal::navigation(DETAIL, page.clone()))
            .await;
        assert!(matches!(outcome, SignalOutcome::Failed { .. }));
        let (category, key) = orchestrator.resolve(DETAIL).unwrap();
        assert!(!orchestrator.has_collected(category, &key));
        assert!(!orchestrator.is_collecting());

        sink.set_failing(false);
        let outcome = orchestrator
            .handle_signal(Signal::navigation(DETAIL, page))
            .await;
        assert!(outcome.is_collected());
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn mismatched_payload_category_is_an_extraction_failure() {
        let (orchestrator, _, sink) = orchestrator(HarvestConfig::default());
        let address = "https://example.com/chain-info?chain=ai";
        let page = Arc::new(ScriptedPage::new("tab", address));
        page.set_payload(address, detail("Widget"));

        let outcome = orchestrator
            .handle_signal(Signal::navigation(address, page))
            .await;
        match outcome {
            SignalOutcome::Failed { error, .. } => assert!(error.contains("detail_page")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn partial_payloads_are_recorded_with_warnings() {
        let (orchestrator, _, sink) = orchestrator(HarvestConfig::default());
        let page = Arc::new(ScriptedPage::new("tab", DETAIL));
        page.set_payload(
            DETAIL,
            Payload::Detail(DetailPayload {
                project_name: "Widget".to_string(),
                ..Default::default()
            }),
        );

        let outcome = orchestrator
            .handle_signal(Signal::navigation(DETAIL, page))
            .await;
        assert!(matches!(outcome, SignalOutcome::Collected { partial: true, .. }));

        let stored = sink.collected();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].warnings.contains(&"company_name".to_string()));
        assert_eq!(orchestrator.stats().partial, 1);
    }

    #[tokio::test]
    async fn seeded_ledger_skips_known_resources() {
        let (first, _, _) = orchestrator(HarvestConfig::default());
        let page = Arc::new(ScriptedPage::new("tab", DETAIL));
        page.set_payload(DETAIL, detail("Widget"));
        first.handle_signal(Signal::navigation(DETAIL, page.clone())).await;

        let (second, extractor, _) = orchestrator(HarvestConfig::default());
        let second = second.with_ledger(first.snapshot());
        let outcome = second.handle_signal(Signal::navigation(DETAIL, page)).await;

        assert!(matches!(
            outcome,
            SignalOutcome::Skipped {
                reason: SkipReason::AlreadyCollected,
                ..
            }
        ));
        assert!(extractor.calls().is_empty());
    }
}
