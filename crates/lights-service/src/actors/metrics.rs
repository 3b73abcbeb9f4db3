//! Queue depth monitoring for the bounded message queues.
//!
//! | Queue      | Normal | Warning  | Critical |
//! |------------|--------|----------|----------|
//! | Broadcast  | < 256  | 256-768  | > 768    |
//! | Outbound   | < 64   | 64-192   | > 192    |
//!
//! Depth is tracked with relaxed atomics; the numbers are advisory and only
//! drive logging and the queue depth gauge.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Which bounded queue a monitor is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Process-wide broadcast distribution queue.
    Broadcast,
    /// One connection's outbound queue.
    Outbound,
}

impl QueueKind {
    /// Label used for the `stage` metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueueKind::Broadcast => "broadcast",
            QueueKind::Outbound => "outbound",
        }
    }

    #[must_use]
    pub const fn normal_threshold(&self) -> usize {
        match self {
            QueueKind::Broadcast => 256,
            QueueKind::Outbound => 64,
        }
    }

    #[must_use]
    pub const fn warning_threshold(&self) -> usize {
        match self {
            QueueKind::Broadcast => 768,
            QueueKind::Outbound => 192,
        }
    }
}

/// Queue depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueueLevel {
    Normal,
    Warning,
    Critical,
}

/// Tracks depth, peak depth and drop counts for one queue.
#[derive(Debug)]
pub struct MailboxMonitor {
    kind: QueueKind,
    /// Owner identifier for logs (connection id, or "distribution").
    owner: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(kind: QueueKind, owner: impl Into<String>) -> Self {
        Self {
            kind,
            owner: owner.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message accepted into the queue.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);

        match self.level_for_depth(new_depth) {
            QueueLevel::Critical => warn!(
                target: "lights.queue",
                queue = self.kind.as_str(),
                owner = %self.owner,
                depth = new_depth,
                threshold = self.kind.warning_threshold(),
                "Queue depth critical"
            ),
            QueueLevel::Warning if new_depth == self.kind.normal_threshold() + 1 => debug!(
                target: "lights.queue",
                queue = self.kind.as_str(),
                owner = %self.owner,
                depth = new_depth,
                "Queue depth elevated"
            ),
            _ => {}
        }
    }

    /// Record a message taken off the queue.
    pub fn record_dequeue(&self) {
        // Saturate so a late dequeue after a reset cannot wrap
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message dropped because the queue was full.
    pub fn record_drop(&self) {
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        warn!(
            target: "lights.queue",
            queue = self.kind.as_str(),
            owner = %self.owner,
            dropped,
            "Message dropped, queue full"
        );
    }

    #[must_use]
    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    fn level_for_depth(&self, depth: usize) -> QueueLevel {
        if depth > self.kind.warning_threshold() {
            QueueLevel::Critical
        } else if depth > self.kind.normal_threshold() {
            QueueLevel::Warning
        } else {
            QueueLevel::Normal
        }
    }
}
