//! Decision coordinator.
//!
//! Records judge decisions into the meet's current round and completes the
//! round once `quorum` distinct judge positions have reported. Completion
//! happens entirely inside the round lock: results are broadcast, a
//! Next-Attempt countdown is started, the delayed `clearResults` is
//! scheduled and the round is emptied before another submission can land.

use crate::actors::broadcaster::BroadcasterHandle;
use crate::errors::LightsError;
use crate::meet::state::MeetState;
use crate::meet::timers::TimerEngine;
use crate::observability::metrics;
use crate::protocol::{ServerMessage, POSITION_CENTER, POSITION_LEFT, POSITION_RIGHT};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Decisions shown on the display once a round completes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundResult {
    pub left: String,
    pub center: String,
    pub right: String,
}

/// What a submission did to the round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Recorded; the round now holds `recorded` decisions.
    Recorded { recorded: usize },
    /// This submission completed the round.
    RoundComplete(RoundResult),
}

#[derive(Debug)]
pub struct DecisionCoordinator {
    broadcaster: BroadcasterHandle,
    timers: Arc<TimerEngine>,
    quorum: usize,
    results_display: Duration,
}

impl DecisionCoordinator {
    #[must_use]
    pub fn new(
        broadcaster: BroadcasterHandle,
        timers: Arc<TimerEngine>,
        quorum: usize,
        results_display: Duration,
    ) -> Self {
        Self {
            broadcaster,
            timers,
            quorum,
            results_display,
        }
    }

    #[must_use]
    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// Apply one judge decision.
    ///
    /// A resubmission from a position already recorded this round overwrites
    /// the earlier decision. Every accepted submission is acknowledged with
    /// `judgeSubmitted`.
    ///
    /// # Errors
    ///
    /// - [`LightsError::UnregisteredJudge`] if `judge_id` is empty
    /// - [`LightsError::MalformedMessage`] if `decision` is empty
    pub async fn submit(
        &self,
        meet: &Arc<MeetState>,
        judge_id: &str,
        decision: &str,
    ) -> Result<SubmitOutcome, LightsError> {
        if judge_id.is_empty() {
            return Err(LightsError::UnregisteredJudge);
        }
        if decision.is_empty() {
            return Err(LightsError::MalformedMessage(
                "decision is empty".to_string(),
            ));
        }

        let meet_name = meet.meet_name();
        let mut round = meet.round.lock().await;

        round
            .decisions
            .insert(judge_id.to_string(), decision.to_string());
        let started_at = *round.started_at.get_or_insert_with(Instant::now);

        self.broadcaster.to_meet(
            meet_name,
            ServerMessage::JudgeSubmitted {
                judge_id: judge_id.to_string(),
                meet_name: meet_name.to_string(),
            },
        );

        let recorded = round.decisions.len();
        if recorded < self.quorum {
            debug!(
                target: "lights.decision",
                meet_name = %meet_name,
                judge_id = %judge_id,
                recorded,
                quorum = self.quorum,
                "Decision recorded"
            );
            return Ok(SubmitOutcome::Recorded { recorded });
        }

        let position = |name: &str| round.decisions.get(name).cloned().unwrap_or_default();
        let result = RoundResult {
            left: position(POSITION_LEFT),
            center: position(POSITION_CENTER),
            right: position(POSITION_RIGHT),
        };

        self.broadcaster.to_meet(
            meet_name,
            ServerMessage::DisplayResults {
                left_decision: result.left.clone(),
                center_decision: result.center.clone(),
                right_decision: result.right.clone(),
                meet_name: meet_name.to_string(),
            },
        );
        self.timers.start_next_attempt(meet).await;
        self.schedule_clear_results(meet);
        round.reset();

        let latency = started_at.elapsed();
        metrics::record_decision_latency(latency);
        metrics::record_round_completed();
        info!(
            target: "lights.decision",
            meet_name = %meet_name,
            left = %result.left,
            center = %result.center,
            right = %result.right,
            latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
            "Round complete"
        );

        Ok(SubmitOutcome::RoundComplete(result))
    }

    /// Broadcast `clearResults` after the display duration unless the meet
    /// is reset first.
    fn schedule_clear_results(&self, meet: &Arc<MeetState>) {
        let broadcaster = self.broadcaster.clone();
        let lifetime = meet.lifetime().clone();
        let meet_name = meet.meet_name().to_string();
        let delay = self.results_display;

        tokio::spawn(async move {
            tokio::select! {
                () = lifetime.cancelled() => {
                    debug!(
                        target: "lights.decision",
                        meet_name = %meet_name,
                        "Pending clearResults dropped, meet was reset"
                    );
                }
                () = tokio::time::sleep(delay) => {
                    broadcaster.to_meet(
                        &meet_name,
                        ServerMessage::ClearResults { meet_name: meet_name.clone() },
                    );
                }
            }
        });
    }
}
