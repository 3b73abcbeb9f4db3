//! Per-meet state and the keyed store that owns it.
//!
//! The store map is guarded by one mutex for insert/lookup/delete. Each
//! [`MeetState`] guards its mutable parts with per-purpose locks (round
//! decisions, Platform-Ready fields, Next-Attempt collection) so unrelated
//! timer kinds never serialize behind one lock.
//!
//! Lock order when more than one is held: `round` before `next_attempt`.
//! `platform_ready` is never held together with another meet lock.

use crate::observability::metrics;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Decisions accumulated in the current round.
#[derive(Debug, Default)]
pub struct Round {
    /// Judge position to decision; at most one entry per position.
    pub decisions: HashMap<String, String>,
    /// When the first decision of this round arrived.
    pub started_at: Option<Instant>,
}

impl Round {
    pub fn reset(&mut self) {
        self.decisions.clear();
        self.started_at = None;
    }
}

/// Platform-Ready countdown fields.
#[derive(Debug, Default)]
pub struct PlatformReady {
    pub active: bool,
    pub deadline: Option<Instant>,
    /// Bumped on every start; a ticker whose generation no longer matches
    /// is stale and exits.
    pub generation: u64,
    pub cancel: Option<CancellationToken>,
}

/// One Next-Attempt countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextAttemptTimer {
    pub id: u64,
    pub seconds_remaining: u64,
    pub active: bool,
}

/// Mutable state of one meet.
#[derive(Debug)]
pub struct MeetState {
    meet_name: String,
    pub(crate) round: Mutex<Round>,
    pub(crate) platform_ready: Mutex<PlatformReady>,
    pub(crate) next_attempt: Mutex<Vec<NextAttemptTimer>>,
    /// Cancelled when the meet is cleared; every background task spawned on
    /// behalf of this state observes it.
    lifetime: CancellationToken,
}

impl MeetState {
    #[must_use]
    pub fn new(meet_name: &str) -> Self {
        Self {
            meet_name: meet_name.to_string(),
            round: Mutex::new(Round::default()),
            platform_ready: Mutex::new(PlatformReady::default()),
            next_attempt: Mutex::new(Vec::new()),
            lifetime: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn meet_name(&self) -> &str {
        &self.meet_name
    }

    /// Token cancelled when this state is discarded.
    #[must_use]
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    /// Whether this state has been discarded by `clear`.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.lifetime.is_cancelled()
    }

    /// Copy of the decisions recorded this round.
    pub async fn decisions(&self) -> HashMap<String, String> {
        self.round.lock().await.decisions.clone()
    }

    /// Drop any partially accumulated round.
    pub async fn clear_round(&self) {
        self.round.lock().await.reset();
    }

    pub async fn platform_ready_active(&self) -> bool {
        self.platform_ready.lock().await.active
    }

    pub async fn platform_ready_generation(&self) -> u64 {
        self.platform_ready.lock().await.generation
    }

    /// Copy of the Next-Attempt collection, including inactive entries.
    pub async fn next_attempt_timers(&self) -> Vec<NextAttemptTimer> {
        self.next_attempt.lock().await.clone()
    }

    /// Stop every background task belonging to this state.
    pub(crate) async fn retire(&self) {
        self.lifetime.cancel();
        let mut platform_ready = self.platform_ready.lock().await;
        platform_ready.active = false;
        if let Some(token) = platform_ready.cancel.take() {
            token.cancel();
        }
    }
}

/// Access to per-meet state, keyed by meet name.
#[async_trait]
pub trait StateProvider: Send + Sync {
    /// Return the meet's state, creating a fresh one if none exists.
    /// Concurrent calls for the same unseen meet return the same instance.
    async fn get_or_create(&self, meet_name: &str) -> Arc<MeetState>;

    /// Return the meet's state without creating it.
    async fn get(&self, meet_name: &str) -> Option<Arc<MeetState>>;

    /// Remove the meet's state and stop its background tasks. A later
    /// `get_or_create` returns a new, distinct instance.
    async fn clear(&self, meet_name: &str) -> Option<Arc<MeetState>>;

    /// Names of meets with live state, sorted.
    async fn meet_names(&self) -> Vec<String>;
}

/// In-memory [`StateProvider`].
#[derive(Debug, Default)]
pub struct MeetStateStore {
    meets: Mutex<HashMap<String, Arc<MeetState>>>,
}

impl MeetStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.meets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.meets.lock().await.is_empty()
    }
}

#[async_trait]
impl StateProvider for MeetStateStore {
    async fn get_or_create(&self, meet_name: &str) -> Arc<MeetState> {
        let mut meets = self.meets.lock().await;
        if let Some(state) = meets.get(meet_name) {
            return Arc::clone(state);
        }

        let state = Arc::new(MeetState::new(meet_name));
        meets.insert(meet_name.to_string(), Arc::clone(&state));
        metrics::set_meets_active(meets.len());
        info!(
            target: "lights.state",
            meet_name = %meet_name,
            meets = meets.len(),
            "Meet state created"
        );
        state
    }

    async fn get(&self, meet_name: &str) -> Option<Arc<MeetState>> {
        self.meets.lock().await.get(meet_name).cloned()
    }

    async fn clear(&self, meet_name: &str) -> Option<Arc<MeetState>> {
        let removed = {
            let mut meets = self.meets.lock().await;
            let removed = meets.remove(meet_name);
            metrics::set_meets_active(meets.len());
            removed
        }?;

        removed.retire().await;
        info!(
            target: "lights.state",
            meet_name = %meet_name,
            "Meet state cleared"
        );
        Some(removed)
    }

    async fn meet_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.meets.lock().await.keys().cloned().collect();
        names.sort();
        names
    }
}
