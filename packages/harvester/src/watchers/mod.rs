//! Polling watchers.
//!
//! Event hooks miss things: single-page route changes without a navigation,
//! diagrams swapped in place, content that changes while the operator just
//! looks at it. Each watcher polls one page at a fixed cadence and either
//! turns what it sees into a [`Signal`](crate::types::signal::Signal) or feeds
//! the [`InteractionGuard`](crate::interaction::InteractionGuard).
//!
//! Available watchers:
//! - `AddressWatcher` - route changes (500 ms)
//! - `AttributeWatcher` - in-page probe value changes (200 ms)
//! - `InteractionWatcher` - human input (200 ms)
//! - `RefreshWatcher` - periodic re-check of collected re-collectible pages (30 s)

pub mod address;
pub mod attribute;
pub mod input;
pub mod refresh;

pub use address::AddressWatcher;
pub use attribute::AttributeWatcher;
pub use input::InteractionWatcher;
pub use refresh::RefreshWatcher;

use async_trait::async_trait;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::HarvestResult;

/// A periodic task bound to one page.
#[async_trait]
pub trait Watcher: Send + 'static {
    fn name(&self) -> &'static str;

    /// Time between two polls.
    fn cadence(&self) -> Duration;

    /// Poll once. `Break` stops the watcher for good (signal loop gone).
    async fn tick(&mut self) -> HarvestResult<ControlFlow<()>>;
}

/// Drive `watcher` until `shutdown` fires or it breaks.
///
/// Errors are logged and followed by `backoff` before the next poll.
pub async fn run_watcher<W: Watcher>(mut watcher: W, backoff: Duration, shutdown: CancellationToken) {
    let name = watcher.name();
    let mut interval = tokio::time::interval(watcher.cadence());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(watcher = name, cadence = ?watcher.cadence(), "watcher started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {}
        }

        let result = tokio::select! {
            _ = shutdown.cancelled() => break,
            result = watcher.tick() => result,
        };

        match result {
            Ok(ControlFlow::Continue(())) => {}
            Ok(ControlFlow::Break(())) => {
                info!(watcher = name, "signal loop closed, watcher stopping");
                break;
            }
            Err(e) => {
                warn!(watcher = name, error = %e, "poll failed, backing off");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                interval.reset();
            }
        }
    }

    debug!(watcher = name, "watcher stopped");
}
