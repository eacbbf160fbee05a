//! Periodic re-check of collected re-collectible pages.

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::Watcher;
use crate::error::HarvestResult;
use crate::orchestrator::Orchestrator;
use crate::page::PageHandle;
use crate::types::signal::{Signal, SignalSource};

/// Emits a `RefreshTick` for the page's address while it shows a collected
/// resource of a re-collectible category. Ticks are skipped while any
/// collection is running.
pub struct RefreshWatcher {
    page: PageHandle,
    orchestrator: Arc<Orchestrator>,
    signals: mpsc::Sender<Signal>,
    cadence: Duration,
}

impl RefreshWatcher {
    pub fn new(
        page: PageHandle,
        orchestrator: Arc<Orchestrator>,
        signals: mpsc::Sender<Signal>,
        cadence: Duration,
    ) -> Self {
        Self {
            page,
            orchestrator,
            signals,
            cadence,
        }
    }
}

#[async_trait]
impl Watcher for RefreshWatcher {
    fn name(&self) -> &'static str {
        "refresh"
    }

    fn cadence(&self) -> Duration {
        self.cadence
    }

    async fn tick(&mut self) -> HarvestResult<ControlFlow<()>> {
        if self.orchestrator.is_collecting() {
            debug!(page = self.page.id(), "collection running, skipping refresh");
            return Ok(ControlFlow::Continue(()));
        }

        let address = self.page.address().await?;
        if !self.orchestrator.is_refresh_candidate(&address) {
            return Ok(ControlFlow::Continue(()));
        }

        let signal = Signal::new(SignalSource::RefreshTick, address, self.page.inner().clone());
        Ok(match self.signals.send(signal).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        })
    }
}
