//! Route changes that never fire a navigation event.

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::Watcher;
use crate::error::HarvestResult;
use crate::page::PageHandle;
use crate::types::signal::{Signal, SignalSource};

pub struct AddressWatcher {
    page: PageHandle,
    signals: mpsc::Sender<Signal>,
    cadence: Duration,
    last: String,
}

impl AddressWatcher {
    /// `current` is the address already reported for this page.
    pub fn new(
        page: PageHandle,
        signals: mpsc::Sender<Signal>,
        cadence: Duration,
        current: impl Into<String>,
    ) -> Self {
        Self {
            page,
            signals,
            cadence,
            last: current.into(),
        }
    }
}

#[async_trait]
impl Watcher for AddressWatcher {
    fn name(&self) -> &'static str {
        "address"
    }

    fn cadence(&self) -> Duration {
        self.cadence
    }

    async fn tick(&mut self) -> HarvestResult<ControlFlow<()>> {
        let address = self.page.address().await?;
        if address == self.last {
            return Ok(ControlFlow::Continue(()));
        }

        debug!(page = self.page.id(), from = %self.last, to = %address, "address changed");
        self.last.clone_from(&address);
        let signal = Signal::new(SignalSource::AddressPoll, address, self.page.inner().clone());
        Ok(match self.signals.send(signal).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        })
    }
}
