//! Integration tests for round accumulation and result display.
//!
//! Drives the service through in-memory clients with a paused clock so the
//! results-display delay and Next-Attempt countdown are deterministic.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use lights_service::errors::LightsError;
use lights_service::protocol::{ServerMessage, TimerView};
use lights_test_utils::*;

/// Advance the paused clock one second at a time, letting tasks run between.
async fn advance_secs(seconds: u64) {
    for _ in 0..seconds {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
}

// ============================================================================
// Round completion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_three_decisions_display_then_clear_after_fifteen_seconds() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let [left, center, right] = harness.panel(TEST_MEET).await;
    settle().await;
    display.drain();

    left.submit("good").await;
    center.submit("no lift").await;
    right.submit("good").await;
    settle().await;

    let messages = display.drain();
    assert_actions(
        &messages,
        &[
            "judgeSubmitted",
            "judgeSubmitted",
            "judgeSubmitted",
            "displayResults",
            "updateNextAttemptTime",
        ],
    );
    assert_eq!(
        messages.get(3),
        Some(&ServerMessage::DisplayResults {
            left_decision: "good".to_string(),
            center_decision: "no lift".to_string(),
            right_decision: "good".to_string(),
            meet_name: TEST_MEET.to_string(),
        })
    );
    assert_eq!(
        last_next_attempt_views(&messages),
        Some(vec![TimerView {
            index: 1,
            time_left: 60
        }])
    );

    // Round empties as soon as it completes
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.decisions.is_empty());

    advance_secs(14).await;
    assert_eq!(count_action(&display.drain(), "clearResults"), 0);

    advance_secs(1).await;
    assert_eq!(count_action(&display.drain(), "clearResults"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_round_completes_exactly_once_and_fourth_submission_starts_fresh() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let [left, center, right] = harness.panel(TEST_MEET).await;
    settle().await;
    display.drain();

    left.submit("good").await;
    center.submit("bad").await;
    right.submit("bad").await;
    left.submit("bad").await;
    settle().await;

    let messages = display.drain();
    assert_eq!(count_action(&messages, "displayResults"), 1);
    assert_eq!(count_action(&messages, "judgeSubmitted"), 4);

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert_eq!(snapshot.decisions.len(), 1);
    assert_eq!(snapshot.decisions.get("left").map(String::as_str), Some("bad"));
}

#[tokio::test(start_paused = true)]
async fn test_resubmission_from_same_position_overwrites() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let [left, center, _right] = harness.panel(TEST_MEET).await;
    settle().await;
    display.drain();

    left.submit("good").await;
    left.submit("bad").await;
    center.submit("good").await;
    settle().await;

    let messages = display.drain();
    assert_eq!(count_action(&messages, "judgeSubmitted"), 3);
    assert_eq!(count_action(&messages, "displayResults"), 0);

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert_eq!(snapshot.decisions.len(), 2);
    assert_eq!(snapshot.decisions.get("left").map(String::as_str), Some("bad"));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_and_legacy_submissions_share_a_round() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let [left, center, right] = harness.panel(TEST_MEET).await;
    settle().await;
    display.drain();

    left.submit_as("left", "good").await;
    center
        .send(serde_json::json!({ "judgeId": "centre", "decision": "good" }))
        .await;
    right.submit("good").await;
    settle().await;

    let messages = display.drain();
    let results: Vec<&ServerMessage> = messages
        .iter()
        .filter(|m| m.action() == "displayResults")
        .collect();
    assert_eq!(
        results,
        vec![&ServerMessage::DisplayResults {
            left_decision: "good".to_string(),
            center_decision: "good".to_string(),
            right_decision: "good".to_string(),
            meet_name: TEST_MEET.to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_unregistered_connection_cannot_submit() {
    let harness = TestService::new();
    let mut watcher = harness.client(TEST_MEET).await;
    let intruder = harness.client(TEST_MEET).await;
    settle().await;

    for judge_id in ["left", "center", "right"] {
        let result = intruder
            .send_json(&submit_decision(TEST_MEET, judge_id, "good"))
            .await;
        assert!(matches!(result, Err(LightsError::UnregisteredJudge)));
    }
    let result = intruder
        .send_json(&serde_json::json!({ "judgeId": "left", "decision": "good" }))
        .await;
    assert!(matches!(result, Err(LightsError::UnregisteredJudge)));
    settle().await;

    assert!(watcher.drain().is_empty());
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.decisions.is_empty());
    assert!(snapshot.connected_judge_ids.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_referee_cannot_submit_for_another_position() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let left = harness.referee(TEST_MEET, "left").await;
    settle().await;
    display.drain();

    let result = left
        .send_json(&submit_decision(TEST_MEET, "right", "no lift"))
        .await;
    settle().await;

    assert!(matches!(result, Err(LightsError::JudgeMismatch { .. })));
    assert!(display.drain().is_empty());
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.decisions.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_round_completes_once_for_every_order_and_duplicate() {
    const ORDERS: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];

    for order in ORDERS {
        // No resubmission, or one right after the first or second
        // submission while the round is still open
        for duplicate_at in [None, Some(0), Some(1)] {
            let harness = TestService::new();
            let mut display = harness.client(TEST_MEET).await;
            let panel = harness.panel(TEST_MEET).await;
            settle().await;
            display.drain();

            for (step, &referee) in order.iter().enumerate() {
                let client = panel.get(referee).unwrap();
                client.submit("good").await;
                if duplicate_at == Some(step) {
                    client.submit("bad").await;
                }
            }
            settle().await;

            let messages = display.drain();
            assert_eq!(
                count_action(&messages, "displayResults"),
                1,
                "order {order:?}, duplicate at {duplicate_at:?}"
            );
            let expected_acks = if duplicate_at.is_some() { 4 } else { 3 };
            assert_eq!(count_action(&messages, "judgeSubmitted"), expected_acks);

            // The resubmitted position shows its corrected decision
            let corrected = duplicate_at.and_then(|at| order.get(at).copied());
            let shown = |referee: usize| {
                if corrected == Some(referee) { "bad" } else { "good" }.to_string()
            };
            let results: Vec<&ServerMessage> = messages
                .iter()
                .filter(|m| m.action() == "displayResults")
                .collect();
            assert_eq!(
                results,
                vec![&ServerMessage::DisplayResults {
                    left_decision: shown(0),
                    center_decision: shown(1),
                    right_decision: shown(2),
                    meet_name: TEST_MEET.to_string(),
                }]
            );
            let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
            assert!(
                snapshot.decisions.is_empty(),
                "order {order:?}, duplicate at {duplicate_at:?}"
            );
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_start_timer_clears_partial_round() {
    let harness = TestService::new();
    let [left, center, right] = harness.panel(TEST_MEET).await;

    left.submit("good").await;
    center.submit("good").await;
    left.action("startTimer").await;
    right.submit("bad").await;

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert_eq!(snapshot.decisions.len(), 1);
    assert_eq!(snapshot.decisions.get("right").map(String::as_str), Some("bad"));
}

#[tokio::test(start_paused = true)]
async fn test_reset_timer_clears_round_and_displays() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let [left, _center, _right] = harness.panel(TEST_MEET).await;
    left.submit("good").await;
    settle().await;
    display.drain();

    left.action("resetTimer").await;
    settle().await;

    assert_actions(&display.drain(), &["resetTimer", "clearResults"]);
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.decisions.is_empty());
}

// ============================================================================
// Referee roster
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_referee_health_tracks_registration_and_disconnect() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;
    let right = harness.referee(TEST_MEET, "right").await;
    let _left = harness.referee(TEST_MEET, "left").await;
    settle().await;

    let messages = display.drain();
    assert_eq!(
        messages.last(),
        Some(&ServerMessage::RefereeHealth {
            connected_ref_ids: vec!["left".to_string(), "right".to_string()],
            connected_referees: 2,
            required_referees: 3,
            meet_name: TEST_MEET.to_string(),
        })
    );

    right.disconnect().await;
    settle().await;

    assert_eq!(
        display.drain(),
        vec![ServerMessage::RefereeHealth {
            connected_ref_ids: vec!["left".to_string()],
            connected_referees: 1,
            required_referees: 3,
            meet_name: TEST_MEET.to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_display_disconnect_sends_no_health_update() {
    let harness = TestService::new();
    let mut watcher = harness.client(TEST_MEET).await;
    let display = harness.client(TEST_MEET).await;
    settle().await;

    display.disconnect().await;
    settle().await;

    assert!(watcher.drain().is_empty());
}

// ============================================================================
// Isolation and fan-out
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_messages_stay_within_their_meet() {
    let harness = TestService::new();
    let mut other = harness.client("other-meet").await;
    let mut display = harness.client(TEST_MEET).await;
    let [left, center, right] = harness.panel(TEST_MEET).await;

    left.submit("good").await;
    center.submit("good").await;
    right.submit("good").await;
    left.action("resetLights").await;
    settle().await;

    assert!(other.drain().is_empty());
    let messages = display.drain();
    assert!(!messages.is_empty());
    assert_all_for_meet(&messages, TEST_MEET);
}

#[tokio::test(start_paused = true)]
async fn test_every_client_sees_the_same_order() {
    let harness = TestService::new();
    let mut first = harness.client(TEST_MEET).await;
    let mut second = harness.client(TEST_MEET).await;
    let left = harness.referee(TEST_MEET, "left").await;

    left.submit("good").await;
    left.action("resetLights").await;
    left.action("startTimer").await;
    settle().await;

    let first_seen = first.drain();
    assert_eq!(first_seen, second.drain());
    assert_eq!(
        actions(&first_seen),
        vec![
            "refereeHealth",
            "judgeSubmitted",
            "resetLights",
            "clearResults",
            "startTimer",
            "updatePlatformReadyTime",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_slow_client_drops_without_affecting_others() {
    let harness = TestService::new();
    let mut slow = TestClient::connect_with_capacity(&harness.service, TEST_MEET, 1).await;
    let mut fast = harness.client(TEST_MEET).await;

    for _ in 0..3 {
        fast.action("resetLights").await;
    }
    settle().await;

    assert_eq!(fast.drain().len(), 3);
    assert_eq!(slow.drain().len(), 1);
    assert_eq!(slow.monitor().messages_dropped(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_begin_shutdown_reaches_every_meet() {
    let harness = TestService::new();
    let mut first = harness.client("meet-a").await;
    let mut second = harness.client("meet-b").await;

    harness.service.begin_shutdown("maintenance");
    settle().await;

    let expected = vec![ServerMessage::ServerShutdown {
        reason: "maintenance".to_string(),
    }];
    assert_eq!(first.drain(), expected);
    assert_eq!(second.drain(), expected);

    harness.shutdown().await;
}
