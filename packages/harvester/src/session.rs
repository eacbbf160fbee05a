//! A running harvest: the signal loop plus watchers for every attached page.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::error::{HarvestError, HarvestResult};
use crate::orchestrator::Orchestrator;
use crate::page::PageHandle;
use crate::traits::browser::BrowserPage;
use crate::types::outcome::HarvestStats;
use crate::types::record::LedgerSnapshot;
use crate::types::signal::Signal;
use crate::watchers::{
    run_watcher, AddressWatcher, AttributeWatcher, InteractionWatcher, RefreshWatcher,
};

/// Final state of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub stats: HarvestStats,
    pub ledger: LedgerSnapshot,
}

/// Owns the signal loop task and the watcher tasks.
///
/// ```ignore
/// let orchestrator = Orchestrator::new(config, extractor, sink)?;
/// let mut session = HarvestSession::start(orchestrator);
/// session.attach_page(page).await?;
/// // ...
/// let summary = session.shutdown().await;
/// ```
pub struct HarvestSession {
    orchestrator: Arc<Orchestrator>,
    signals: mpsc::Sender<Signal>,
    /// Stops the signal loop, aborting in-flight collections.
    loop_cancel: CancellationToken,
    /// Parent of every page's watcher token.
    watcher_cancel: CancellationToken,
    pages: HashMap<String, CancellationToken>,
    signal_loop: JoinHandle<HarvestStats>,
    watchers: JoinSet<()>,
}

impl HarvestSession {
    /// Spawn the signal loop. Must be called inside a tokio runtime.
    pub fn start(orchestrator: Orchestrator) -> Self {
        let orchestrator = Arc::new(orchestrator);
        let (signals, receiver) = mpsc::channel(orchestrator.config().signal_buffer);
        let loop_cancel = CancellationToken::new();
        let signal_loop = tokio::spawn(Arc::clone(&orchestrator).run(receiver, loop_cancel.clone()));

        Self {
            orchestrator,
            signals,
            loop_cancel,
            watcher_cancel: CancellationToken::new(),
            pages: HashMap::new(),
            signal_loop,
            watchers: JoinSet::new(),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Sender for event-driven hooks (navigation, DOM mutation callbacks).
    pub fn signals(&self) -> mpsc::Sender<Signal> {
        self.signals.clone()
    }

    /// Queue a signal from an event hook.
    pub async fn notify(&self, signal: Signal) -> HarvestResult<()> {
        self.signals
            .send(signal)
            .await
            .map_err(|_| HarvestError::BrowserUnavailable("signal loop has stopped".to_string()))
    }

    /// Start observing a page: reports its current address as a navigation
    /// and spawns its watchers.
    ///
    /// A page that cannot report its address is [`HarvestError::BrowserUnavailable`].
    pub async fn attach_page(&mut self, page: Arc<dyn BrowserPage>) -> HarvestResult<()> {
        let config = self.orchestrator.config();
        let id = page.id().to_string();
        if self.pages.contains_key(&id) {
            warn!(page = %id, "page already attached");
            return Ok(());
        }

        let handle = PageHandle::new(Arc::clone(&page), config.call_timeout);
        let address = handle
            .address()
            .await
            .map_err(|e| HarvestError::BrowserUnavailable(format!("page {id}: {e}")))?;

        self.notify(Signal::navigation(address.clone(), page)).await?;

        let cancel = self.watcher_cancel.child_token();
        let watchers = &config.watchers;
        let backoff = watchers.error_backoff;

        self.watchers.spawn(run_watcher(
            AddressWatcher::new(
                handle.clone(),
                self.signals.clone(),
                watchers.address_poll,
                address.clone(),
            ),
            backoff,
            cancel.clone(),
        ));
        if let Some(probe) = &watchers.attribute_probe {
            self.watchers.spawn(run_watcher(
                AttributeWatcher::new(
                    handle.clone(),
                    self.signals.clone(),
                    watchers.attribute_poll,
                    probe.clone(),
                ),
                backoff,
                cancel.clone(),
            ));
        }
        self.watchers.spawn(run_watcher(
            InteractionWatcher::new(
                handle.clone(),
                Arc::clone(self.orchestrator.guard()),
                watchers.input_poll,
            ),
            backoff,
            cancel.clone(),
        ));
        self.watchers.spawn(run_watcher(
            RefreshWatcher::new(
                handle,
                Arc::clone(&self.orchestrator),
                self.signals.clone(),
                watchers.refresh_interval,
            ),
            backoff,
            cancel.clone(),
        ));

        info!(page = %id, address = %address, "page attached");
        self.pages.insert(id, cancel);
        Ok(())
    }

    /// Stop the watchers of one page. Returns false if it was not attached.
    pub fn detach_page(&mut self, id: &str) -> bool {
        match self.pages.remove(id) {
            Some(cancel) => {
                cancel.cancel();
                info!(page = %id, "page detached");
                true
            }
            None => false,
        }
    }

    pub fn attached_pages(&self) -> impl Iterator<Item = &str> + '_ {
        self.pages.keys().map(String::as_str)
    }

    /// Graceful stop: watchers first, then let queued and in-flight signals
    /// finish.
    pub async fn shutdown(self) -> SessionSummary {
        self.finish(false).await
    }

    /// Hard stop: in-flight collections are aborted and stay unrecorded.
    pub async fn abort(self) -> SessionSummary {
        self.finish(true).await
    }

    async fn finish(self, abort: bool) -> SessionSummary {
        let Self {
            orchestrator,
            signals,
            loop_cancel,
            watcher_cancel,
            pages: _,
            signal_loop,
            mut watchers,
        } = self;

        watcher_cancel.cancel();
        if abort {
            loop_cancel.cancel();
        }
        while let Some(joined) = watchers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = %e, "watcher panicked");
                }
            }
        }

        // Last sender gone: the loop drains what is queued and returns.
        drop(signals);
        let stats = match signal_loop.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "signal loop task failed");
                orchestrator.stats()
            }
        };

        SessionSummary {
            stats,
            ledger: orchestrator.snapshot(),
        }
    }
}
