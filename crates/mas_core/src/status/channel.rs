//! Single transient status message shared by every job.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use crate::time_source::SharedTimeSource;

/// How a status message should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Normal,
    Error,
}

/// The message currently shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
    /// Generation that published this message.
    pub generation: u64,
}

impl StatusMessage {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Default)]
struct Inner {
    current: Option<(StatusMessage, Instant)>,
    generation: u64,
}

/// Most-recent-wins status line with automatic expiry.
///
/// Every publish bumps a generation counter and records its own deadline.
/// A clear scheduled by an older publish carries the older generation and
/// does nothing when it fires, so only the newest message's timer counts.
/// Expiry is applied on read and through `expire_due`, so no background
/// task is spawned per message.
#[derive(Debug)]
pub struct StatusChannel {
    inner: Mutex<Inner>,
    clock: SharedTimeSource,
    clear_after: Duration,
}

impl StatusChannel {
    /// Create a channel whose messages clear `clear_after` after publishing.
    pub fn new(clock: SharedTimeSource, clear_after: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            clock,
            clear_after,
        }
    }

    /// Show `text` now and schedule it to clear. Returns its generation.
    pub fn publish(&self, text: impl Into<String>, is_error: bool) -> u64 {
        let text = text.into();
        let deadline = self.clock.now() + self.clear_after;
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let generation = inner.generation;

        if is_error {
            tracing::warn!(generation, "status: {}", text);
        } else {
            tracing::info!(generation, "status: {}", text);
        }

        inner.current = Some((
            StatusMessage {
                text,
                severity: if is_error {
                    Severity::Error
                } else {
                    Severity::Normal
                },
                generation,
            },
            deadline,
        ));
        generation
    }

    /// Empty the message immediately. Pending clears become no-ops.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.current = None;
    }

    /// Clear only if `generation` is still the newest publish.
    ///
    /// This is what a scheduled clear does when it fires.
    pub fn clear_if_current(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation == generation && inner.current.is_some() {
            inner.current = None;
            true
        } else {
            false
        }
    }

    /// Clear the current message if its deadline has passed.
    pub fn expire_due(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let due = matches!(inner.current, Some((_, deadline)) if now >= deadline);
        if due {
            inner.current = None;
        }
        due
    }

    /// Message currently visible, after applying expiry.
    pub fn current(&self) -> Option<StatusMessage> {
        self.expire_due();
        self.inner.lock().current.as_ref().map(|(m, _)| m.clone())
    }

    /// When the visible message will clear.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.lock().current.as_ref().map(|&(_, d)| d)
    }

    /// Newest generation issued.
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }
}
