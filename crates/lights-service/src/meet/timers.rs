//! Timer engine: the Platform-Ready countdown and Next-Attempt countdowns.
//!
//! Every countdown runs as its own task ticking at `tick_interval`. Tasks
//! hold the [`MeetState`] they were started for and re-validate against it
//! on every tick:
//!
//! - Platform-Ready: the tick's generation must still be current and the
//!   timer still active, otherwise the task exits without broadcasting.
//! - Next-Attempt: the timer is looked up by id; if it is gone or inactive
//!   the task exits.
//!
//! This keeps a superseded ticker from touching state that belongs to a
//! newer timer even if its cancellation races with an in-flight tick.

use crate::actors::broadcaster::BroadcasterHandle;
use crate::config::TimerSettings;
use crate::meet::state::{MeetState, NextAttemptTimer};
use crate::observability::metrics;
use crate::protocol::{ServerMessage, TimerView};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// `index` carried by every `updatePlatformReadyTime`.
const PLATFORM_READY_INDEX: usize = 0;

/// Starts and stops countdowns and allocates Next-Attempt ids.
#[derive(Debug)]
pub struct TimerEngine {
    broadcaster: BroadcasterHandle,
    settings: TimerSettings,
    next_id: AtomicU64,
}

impl TimerEngine {
    #[must_use]
    pub fn new(broadcaster: BroadcasterHandle, settings: TimerSettings) -> Self {
        Self {
            broadcaster,
            settings,
            next_id: AtomicU64::new(0),
        }
    }

    /// Start (or restart) the meet's Platform-Ready countdown.
    ///
    /// Cancels any running countdown, bumps the generation, then broadcasts
    /// `clearResults`, the `startTimer` cue and an immediate
    /// `updatePlatformReadyTime`, so displays clear before the cue. Returns
    /// the new generation.
    pub async fn start_platform_ready(&self, meet: &Arc<MeetState>) -> u64 {
        let meet_name = meet.meet_name();
        let token = meet.lifetime().child_token();

        let generation = {
            let mut platform_ready = meet.platform_ready.lock().await;
            if let Some(previous) = platform_ready.cancel.take() {
                previous.cancel();
            }
            platform_ready.generation += 1;
            platform_ready.active = true;
            let now = Instant::now();
            let deadline = now + self.settings.platform_ready;
            platform_ready.deadline = Some(deadline);
            platform_ready.cancel = Some(token.clone());

            self.broadcaster.to_meet(
                meet_name,
                ServerMessage::ClearResults {
                    meet_name: meet_name.to_string(),
                },
            );
            self.broadcaster.to_meet(
                meet_name,
                ServerMessage::StartTimer {
                    meet_name: meet_name.to_string(),
                },
            );
            self.broadcaster.to_meet(
                meet_name,
                ServerMessage::UpdatePlatformReadyTime {
                    time_left: seconds_until(deadline, now),
                    index: PLATFORM_READY_INDEX,
                    meet_name: meet_name.to_string(),
                },
            );
            platform_ready.generation
        };

        metrics::record_timer_started("platform_ready");
        info!(
            target: "lights.timer",
            meet_name = %meet_name,
            generation,
            seconds = self.settings.platform_ready.as_secs(),
            "Platform-Ready timer started"
        );

        tokio::spawn(run_platform_ready(
            Arc::clone(meet),
            generation,
            self.broadcaster.clone(),
            self.settings.tick_interval,
            token,
        ));
        generation
    }

    /// Deactivate the Platform-Ready countdown without an expiry broadcast.
    /// Returns whether a countdown was running.
    pub async fn reset_platform_ready(&self, meet: &MeetState) -> bool {
        let mut platform_ready = meet.platform_ready.lock().await;
        let was_active = platform_ready.active;
        platform_ready.active = false;
        platform_ready.deadline = None;
        if let Some(token) = platform_ready.cancel.take() {
            token.cancel();
        }

        if was_active {
            info!(
                target: "lights.timer",
                meet_name = %meet.meet_name(),
                generation = platform_ready.generation,
                "Platform-Ready timer reset"
            );
        }
        was_active
    }

    /// Whole seconds left on the Platform-Ready countdown, if active.
    pub async fn platform_ready_remaining(&self, meet: &MeetState) -> Option<u64> {
        let platform_ready = meet.platform_ready.lock().await;
        if !platform_ready.active {
            return None;
        }
        platform_ready
            .deadline
            .map(|deadline| seconds_until(deadline, Instant::now()))
    }

    /// Add a Next-Attempt countdown and broadcast the full active set.
    /// Returns the new timer's id.
    pub async fn start_next_attempt(&self, meet: &Arc<MeetState>) -> u64 {
        let meet_name = meet.meet_name();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;

        {
            let mut timers = meet.next_attempt.lock().await;
            timers.push(NextAttemptTimer {
                id,
                seconds_remaining: self.settings.next_attempt_seconds,
                active: true,
            });
            self.broadcaster.to_meet(
                meet_name,
                ServerMessage::UpdateNextAttemptTime {
                    timers: active_views(&timers),
                    meet_name: meet_name.to_string(),
                },
            );
        }

        metrics::record_timer_started("next_attempt");
        info!(
            target: "lights.timer",
            meet_name = %meet_name,
            timer_id = id,
            seconds = self.settings.next_attempt_seconds,
            "Next-Attempt timer started"
        );

        tokio::spawn(run_next_attempt(
            Arc::clone(meet),
            id,
            self.broadcaster.clone(),
            self.settings.tick_interval,
        ));
        id
    }

    /// Active Next-Attempt countdowns as clients see them.
    pub async fn next_attempt_views(&self, meet: &MeetState) -> Vec<TimerView> {
        active_views(&meet.next_attempt.lock().await)
    }
}

/// Active timers renumbered 1..K by live position.
#[must_use]
pub fn active_views(timers: &[NextAttemptTimer]) -> Vec<TimerView> {
    timers
        .iter()
        .filter(|timer| timer.active)
        .enumerate()
        .map(|(position, timer)| TimerView {
            index: position + 1,
            time_left: timer.seconds_remaining,
        })
        .collect()
}

/// Display index of timer `id` among active timers.
fn display_index(timers: &[NextAttemptTimer], id: u64) -> Option<usize> {
    timers
        .iter()
        .filter(|timer| timer.active)
        .position(|timer| timer.id == id)
        .map(|position| position + 1)
}

/// Whole seconds from `now` to `deadline`, rounded up.
fn seconds_until(deadline: Instant, now: Instant) -> u64 {
    let left = deadline.saturating_duration_since(now);
    left.as_secs() + u64::from(left.subsec_nanos() > 0)
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_platform_ready(
    meet: Arc<MeetState>,
    generation: u64,
    broadcaster: BroadcasterHandle,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let meet_name = meet.meet_name().to_string();
    let mut ticker = ticker(tick_interval);

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "lights.timer",
                    meet_name = %meet_name,
                    generation,
                    "Platform-Ready ticker cancelled"
                );
                return;
            }
            _ = ticker.tick() => {}
        }

        let mut platform_ready = meet.platform_ready.lock().await;
        if platform_ready.generation != generation || !platform_ready.active {
            debug!(
                target: "lights.timer",
                meet_name = %meet_name,
                generation,
                current = platform_ready.generation,
                "Stale Platform-Ready ticker exiting"
            );
            return;
        }
        let Some(deadline) = platform_ready.deadline else {
            return;
        };

        let time_left = seconds_until(deadline, Instant::now());
        if time_left == 0 {
            platform_ready.active = false;
            platform_ready.deadline = None;
            platform_ready.cancel = None;
            broadcaster.to_meet(
                &meet_name,
                ServerMessage::PlatformReadyExpired {
                    meet_name: meet_name.clone(),
                },
            );
            info!(
                target: "lights.timer",
                meet_name = %meet_name,
                generation,
                "Platform-Ready timer expired"
            );
            return;
        }

        broadcaster.to_meet(
            &meet_name,
            ServerMessage::UpdatePlatformReadyTime {
                time_left,
                index: PLATFORM_READY_INDEX,
                meet_name: meet_name.clone(),
            },
        );
    }
}

async fn run_next_attempt(
    meet: Arc<MeetState>,
    id: u64,
    broadcaster: BroadcasterHandle,
    tick_interval: Duration,
) {
    let meet_name = meet.meet_name().to_string();
    let lifetime = meet.lifetime().clone();
    let mut ticker = ticker(tick_interval);

    loop {
        tokio::select! {
            () = lifetime.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let mut timers = meet.next_attempt.lock().await;
        let Some(timer) = timers.iter_mut().find(|timer| timer.id == id) else {
            return;
        };
        if !timer.active {
            return;
        }
        timer.seconds_remaining = timer.seconds_remaining.saturating_sub(1);

        if timer.seconds_remaining > 0 {
            broadcaster.to_meet(
                &meet_name,
                ServerMessage::UpdateNextAttemptTime {
                    timers: active_views(&timers),
                    meet_name: meet_name.clone(),
                },
            );
            continue;
        }

        // Index must be taken before the timer leaves the active set
        let index = display_index(&timers, id).unwrap_or(0);
        if let Some(timer) = timers.iter_mut().find(|timer| timer.id == id) {
            timer.active = false;
        }
        broadcaster.to_meet(
            &meet_name,
            ServerMessage::NextAttemptExpired {
                index,
                meet_name: meet_name.clone(),
            },
        );
        timers.retain(|timer| timer.id != id);
        broadcaster.to_meet(
            &meet_name,
            ServerMessage::UpdateNextAttemptTime {
                timers: active_views(&timers),
                meet_name: meet_name.clone(),
            },
        );
        info!(
            target: "lights.timer",
            meet_name = %meet_name,
            timer_id = id,
            index,
            remaining_timers = timers.len(),
            "Next-Attempt timer expired"
        );
        return;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn timer(id: u64, seconds_remaining: u64, active: bool) -> NextAttemptTimer {
        NextAttemptTimer {
            id,
            seconds_remaining,
            active,
        }
    }

    #[test]
    fn test_active_views_are_dense_and_skip_inactive() {
        let timers = vec![
            timer(4, 10, true),
            timer(7, 0, false),
            timer(9, 30, true),
            timer(12, 55, true),
        ];

        let views = active_views(&timers);
        let indices: Vec<usize> = views.iter().map(|v| v.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(views.last().unwrap().time_left, 55);
    }

    #[test]
    fn test_display_index_ignores_allocation_id() {
        let timers = vec![timer(40, 5, false), timer(41, 6, true), timer(42, 7, true)];
        assert_eq!(display_index(&timers, 42), Some(2));
        assert_eq!(display_index(&timers, 40), None);
        assert_eq!(display_index(&timers, 99), None);
    }

    #[test]
    fn test_seconds_until_rounds_up() {
        let now = Instant::now();
        assert_eq!(seconds_until(now + Duration::from_secs(60), now), 60);
        assert_eq!(seconds_until(now + Duration::from_millis(59_001), now), 60);
        assert_eq!(seconds_until(now + Duration::from_millis(1), now), 1);
        assert_eq!(seconds_until(now, now), 0);
        assert_eq!(seconds_until(now, now + Duration::from_secs(3)), 0);
    }
}
