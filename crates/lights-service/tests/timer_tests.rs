//! Integration tests for the Platform-Ready and Next-Attempt countdowns.
//!
//! Uses tokio's paused clock; every second is advanced explicitly so each
//! ticker fires exactly once per step.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use lights_service::protocol::{ServerMessage, TimerView};
use lights_test_utils::*;

async fn advance_secs(seconds: u64) {
    for _ in 0..seconds {
        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
    }
}

fn view(index: usize, time_left: u64) -> TimerView {
    TimerView { index, time_left }
}

// ============================================================================
// Platform-Ready
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_platform_ready_counts_down_and_expires() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startTimer").await;
    settle().await;
    assert_actions(
        &display.drain(),
        &["clearResults", "startTimer", "updatePlatformReadyTime"],
    );

    advance_secs(59).await;
    let ticks = platform_ready_ticks(&display.drain());
    assert_eq!(ticks, (1..=59).rev().collect::<Vec<u64>>());

    advance_secs(1).await;
    assert_eq!(
        display.drain(),
        vec![ServerMessage::PlatformReadyExpired {
            meet_name: TEST_MEET.to_string(),
        }]
    );

    advance_secs(5).await;
    assert!(display.drain().is_empty());
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(!snapshot.platform_ready.active);
}

#[tokio::test(start_paused = true)]
async fn test_platform_ready_ticks_carry_index_zero() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startTimer").await;
    advance_secs(1).await;

    let updates: Vec<ServerMessage> = display
        .drain()
        .into_iter()
        .filter(|m| m.action() == "updatePlatformReadyTime")
        .collect();
    assert_eq!(
        updates,
        vec![
            ServerMessage::UpdatePlatformReadyTime {
                time_left: 60,
                index: 0,
                meet_name: TEST_MEET.to_string(),
            },
            ServerMessage::UpdatePlatformReadyTime {
                time_left: 59,
                index: 0,
                meet_name: TEST_MEET.to_string(),
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_stops_countdown_without_expiry() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startTimer").await;
    advance_secs(10).await;
    display.action("resetTimer").await;
    settle().await;
    display.drain();

    advance_secs(70).await;

    assert!(display.drain().is_empty());
    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(!snapshot.platform_ready.active);
    assert_eq!(snapshot.platform_ready.time_left, None);
}

#[tokio::test(start_paused = true)]
async fn test_restart_supersedes_previous_countdown() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startTimer").await;
    advance_secs(10).await;
    display.action("startTimer").await;
    settle().await;
    assert_eq!(platform_ready_ticks(&display.drain()).last(), Some(&60));

    // One tick per second: the first ticker must stay silent
    advance_secs(1).await;
    assert_eq!(platform_ready_ticks(&display.drain()), vec![59]);

    advance_secs(50).await;
    let messages = display.drain();
    assert_eq!(count_action(&messages, "platformReadyExpired"), 0);
    assert_eq!(platform_ready_ticks(&messages).len(), 50);

    advance_secs(9).await;
    assert_eq!(count_action(&display.drain(), "platformReadyExpired"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_reports_remaining_platform_ready_time() {
    let harness = TestService::new();
    let display = harness.client(TEST_MEET).await;

    display.action("startTimer").await;
    advance_secs(25).await;

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.platform_ready.active);
    assert_eq!(snapshot.platform_ready.time_left, Some(35));
}

// ============================================================================
// Next-Attempt
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_next_attempt_counts_down_and_expires() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startNextAttemptTimer").await;
    settle().await;
    assert_eq!(
        last_next_attempt_views(&display.drain()),
        Some(vec![view(1, 60)])
    );

    advance_secs(59).await;
    assert_eq!(
        last_next_attempt_views(&display.drain()),
        Some(vec![view(1, 1)])
    );

    advance_secs(1).await;
    let messages = display.drain();
    assert_actions(&messages, &["nextAttemptExpired", "updateNextAttemptTime"]);
    assert_eq!(expired_indices(&messages), vec![1]);
    assert_eq!(last_next_attempt_views(&messages), Some(vec![]));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_next_attempt_timers_reindex_densely() {
    let harness = TestService::new();
    let mut display = harness.client(TEST_MEET).await;

    display.action("startNextAttemptTimer").await;
    advance_secs(10).await;
    display.action("startNextAttemptTimer").await;
    settle().await;

    let messages = display.drain();
    assert_eq!(
        last_next_attempt_views(&messages),
        Some(vec![view(1, 50), view(2, 60)])
    );

    advance_secs(49).await;
    let messages = display.drain();
    for message in &messages {
        if let ServerMessage::UpdateNextAttemptTime { timers, .. } = message {
            assert_dense(timers);
        }
    }

    // First timer expires at its displayed index; the second moves up to 1
    advance_secs(1).await;
    let messages = display.drain();
    assert_eq!(expired_indices(&messages), vec![1]);
    assert_eq!(last_next_attempt_views(&messages), Some(vec![view(1, 10)]));

    advance_secs(10).await;
    let messages = display.drain();
    assert_eq!(expired_indices(&messages), vec![1]);
    assert_eq!(last_next_attempt_views(&messages), Some(vec![]));

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert!(snapshot.next_attempt_timers.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_round_completion_starts_next_attempt_timer() {
    let harness = TestService::new();
    let [left, center, right] = harness.panel(TEST_MEET).await;

    left.submit("good").await;
    center.submit("good").await;
    right.submit("good").await;
    advance_secs(5).await;

    let snapshot = harness.service.snapshot(TEST_MEET).await.unwrap();
    assert_eq!(snapshot.next_attempt_timers, vec![view(1, 55)]);
}

#[tokio::test(start_paused = true)]
async fn test_timers_in_different_meets_are_independent() {
    let harness = TestService::new();
    let mut first = harness.client("meet-a").await;
    let mut second = harness.client("meet-b").await;

    first.action("startNextAttemptTimer").await;
    advance_secs(3).await;

    assert_eq!(
        last_next_attempt_views(&first.drain()),
        Some(vec![view(1, 57)])
    );
    assert!(second.drain().is_empty());
}
