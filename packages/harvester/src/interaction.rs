//! Human activity tracking.
//!
//! The guard is an information source only. It never blocks; the
//! orchestrator reads it and applies the category's [`InteractionPolicy`].
//!
//! [`InteractionPolicy`]: crate::types::category::InteractionPolicy

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Kind of human input observed on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    PointerMove,
    Click,
    KeyPress,
    Scroll,
}

/// Tracks the last human input and answers "is the operator active?".
#[derive(Debug)]
pub struct InteractionGuard {
    quiet_period: Duration,
    last_activity: Mutex<Option<Instant>>,
}

impl InteractionGuard {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            last_activity: Mutex::new(None),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Record input observed just now.
    pub fn record_activity(&self) {
        self.record_activity_at(Instant::now());
    }

    /// Record input observed at `at`. Older instants never rewind the state.
    pub fn record_activity_at(&self, at: Instant) {
        let mut last = self.lock();
        if last.map_or(true, |previous| at > previous) {
            *last = Some(at);
        }
    }

    pub fn last_activity(&self) -> Option<Instant> {
        *self.lock()
    }

    /// True iff `now - last_activity < quiet_period`.
    pub fn is_active(&self, now: Instant) -> bool {
        match *self.lock() {
            Some(last) => now.saturating_duration_since(last) < self.quiet_period,
            None => false,
        }
    }

    /// Instant at which the operator will count as idle, if currently active.
    pub fn quiet_at(&self, now: Instant) -> Option<Instant> {
        let last = (*self.lock())?;
        let deadline = last + self.quiet_period;
        (deadline > now).then_some(deadline)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        // State is a single Option; a poisoned lock still holds a valid value.
        self.last_activity
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
