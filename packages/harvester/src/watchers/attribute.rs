//! In-place content swaps, detected through a read-only in-page probe.

use async_trait::async_trait;
use serde_json::Value;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::Watcher;
use crate::error::HarvestResult;
use crate::page::PageHandle;
use crate::types::signal::{Signal, SignalSource};

/// Emits an `AttributeChange` signal for the current address whenever the
/// probe's value changes to something non-null.
///
/// The first poll only records a baseline.
pub struct AttributeWatcher {
    page: PageHandle,
    signals: mpsc::Sender<Signal>,
    cadence: Duration,
    probe: String,
    last: Option<Value>,
}

impl AttributeWatcher {
    pub fn new(
        page: PageHandle,
        signals: mpsc::Sender<Signal>,
        cadence: Duration,
        probe: impl Into<String>,
    ) -> Self {
        Self {
            page,
            signals,
            cadence,
            probe: probe.into(),
            last: None,
        }
    }
}

#[async_trait]
impl Watcher for AttributeWatcher {
    fn name(&self) -> &'static str {
        "attribute"
    }

    fn cadence(&self) -> Duration {
        self.cadence
    }

    async fn tick(&mut self) -> HarvestResult<ControlFlow<()>> {
        let value = self.page.evaluate(&self.probe).await?;
        let Some(previous) = self.last.replace(value.clone()) else {
            return Ok(ControlFlow::Continue(()));
        };
        if previous == value || value.is_null() {
            return Ok(ControlFlow::Continue(()));
        }

        let address = self.page.address().await?;
        debug!(page = self.page.id(), %previous, current = %value, "probed attribute changed");
        let signal = Signal::new(SignalSource::AttributeChange, address, self.page.inner().clone());
        Ok(match self.signals.send(signal).await {
            Ok(()) => ControlFlow::Continue(()),
            Err(_) => ControlFlow::Break(()),
        })
    }
}
