//! Assertions over captured server messages.

use lights_service::protocol::{ServerMessage, TimerView};

/// `action` tags in order.
pub fn actions(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(ServerMessage::action).collect()
}

/// Assert the exact sequence of `action` tags.
#[track_caller]
pub fn assert_actions(messages: &[ServerMessage], expected: &[&str]) {
    assert_eq!(
        actions(messages),
        expected,
        "unexpected message sequence: {messages:#?}"
    );
}

/// Count messages with the given action.
pub fn count_action(messages: &[ServerMessage], action: &str) -> usize {
    messages.iter().filter(|m| m.action() == action).count()
}

/// Assert no message belongs to a meet other than `meet_name`.
#[track_caller]
pub fn assert_all_for_meet(messages: &[ServerMessage], meet_name: &str) {
    for message in messages {
        if let Some(name) = message.meet_name() {
            assert_eq!(name, meet_name, "message leaked across meets: {message:?}");
        }
    }
}

/// The `timeLeft` values of every `updatePlatformReadyTime`, in order.
pub fn platform_ready_ticks(messages: &[ServerMessage]) -> Vec<u64> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::UpdatePlatformReadyTime { time_left, .. } => Some(*time_left),
            _ => None,
        })
        .collect()
}

/// The timer list of the last `updateNextAttemptTime`, if any.
pub fn last_next_attempt_views(messages: &[ServerMessage]) -> Option<Vec<TimerView>> {
    messages.iter().rev().find_map(|m| match m {
        ServerMessage::UpdateNextAttemptTime { timers, .. } => Some(timers.clone()),
        _ => None,
    })
}

/// Every `nextAttemptExpired` index, in order.
pub fn expired_indices(messages: &[ServerMessage]) -> Vec<usize> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::NextAttemptExpired { index, .. } => Some(*index),
            _ => None,
        })
        .collect()
}

/// Assert each list is 1..K with no gaps.
#[track_caller]
pub fn assert_dense(views: &[TimerView]) {
    for (position, view) in views.iter().enumerate() {
        assert_eq!(view.index, position + 1, "indices not dense: {views:?}");
    }
}
