//! Human input → interaction guard.

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::Watcher;
use crate::error::HarvestResult;
use crate::interaction::InteractionGuard;
use crate::page::PageHandle;

pub struct InteractionWatcher {
    page: PageHandle,
    guard: Arc<InteractionGuard>,
    cadence: Duration,
}

impl InteractionWatcher {
    pub fn new(page: PageHandle, guard: Arc<InteractionGuard>, cadence: Duration) -> Self {
        Self {
            page,
            guard,
            cadence,
        }
    }
}

#[async_trait]
impl Watcher for InteractionWatcher {
    fn name(&self) -> &'static str {
        "interaction"
    }

    fn cadence(&self) -> Duration {
        self.cadence
    }

    async fn tick(&mut self) -> HarvestResult<ControlFlow<()>> {
        let events = self.page.drain_input().await?;
        if !events.is_empty() {
            trace!(page = self.page.id(), events = events.len(), "human input");
            self.guard.record_activity();
        }
        Ok(ControlFlow::Continue(()))
    }
}
