//! Wire protocol for referee and display connections.
//!
//! Both directions are JSON text frames keyed by an `action` string.
//! Inbound records are parsed leniently into [`ClientMessage`] (every field
//! optional) and then validated into an [`InboundCommand`]; outbound records
//! are the strongly typed [`ServerMessage`].

use crate::errors::LightsError;
use serde::{Deserialize, Serialize};

/// Judge position names used in `displayResults`.
pub const POSITION_LEFT: &str = "left";
pub const POSITION_CENTER: &str = "center";
pub const POSITION_RIGHT: &str = "right";

/// Raw inbound record as sent by referee and display pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub meet_name: Option<String>,
    #[serde(default, alias = "judgeID")]
    pub judge_id: Option<String>,
    #[serde(default)]
    pub decision: Option<String>,
}

/// A validated inbound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundCommand {
    RegisterRef { judge_id: String },
    StartTimer,
    ResetTimer,
    ResetLights,
    StartNextAttemptTimer,
    /// `judge_id` is `None` when the record relies on the connection's
    /// registered identity.
    SubmitDecision {
        judge_id: Option<String>,
        decision: String,
    },
    /// A client echoing a Platform-Ready tick back.
    TimerEcho,
    Unknown(String),
}

impl InboundCommand {
    /// Bounded label for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            InboundCommand::RegisterRef { .. } => "registerRef",
            InboundCommand::StartTimer => "startTimer",
            InboundCommand::ResetTimer => "resetTimer",
            InboundCommand::ResetLights => "resetLights",
            InboundCommand::StartNextAttemptTimer => "startNextAttemptTimer",
            InboundCommand::SubmitDecision { .. } => "submitDecision",
            InboundCommand::TimerEcho => "updatePlatformReadyTime",
            InboundCommand::Unknown(_) => "unknown",
        }
    }
}

/// Parse one inbound text frame.
///
/// # Errors
///
/// Returns [`LightsError::MalformedMessage`] if the frame is not a JSON
/// object or an action lacks a required field.
pub fn parse_client_message(text: &str) -> Result<(ClientMessage, InboundCommand), LightsError> {
    let message: ClientMessage = serde_json::from_str(text)?;
    let command = message.clone().into_command()?;
    Ok((message, command))
}

impl ClientMessage {
    /// Validate the record into a command.
    ///
    /// # Errors
    ///
    /// Returns [`LightsError::MalformedMessage`] when a required field is
    /// missing or empty.
    pub fn into_command(self) -> Result<InboundCommand, LightsError> {
        let judge_id = non_empty(self.judge_id).map(|id| normalize_position(&id));
        let decision = non_empty(self.decision);

        let Some(action) = non_empty(self.action) else {
            // Legacy referee pages send a bare `{judgeId, decision}`
            return match (judge_id, decision) {
                (Some(judge_id), Some(decision)) => Ok(InboundCommand::SubmitDecision {
                    judge_id: Some(judge_id),
                    decision,
                }),
                _ => Err(LightsError::MalformedMessage(
                    "record has no action".to_string(),
                )),
            };
        };

        let command = match action.as_str() {
            "registerRef" => InboundCommand::RegisterRef {
                judge_id: judge_id.ok_or_else(|| {
                    LightsError::MalformedMessage("registerRef requires judgeId".to_string())
                })?,
            },
            "startTimer" => InboundCommand::StartTimer,
            "resetTimer" => InboundCommand::ResetTimer,
            "resetLights" => InboundCommand::ResetLights,
            "startNextAttemptTimer" => InboundCommand::StartNextAttemptTimer,
            "submitDecision" => InboundCommand::SubmitDecision {
                judge_id,
                decision: decision.ok_or_else(|| {
                    LightsError::MalformedMessage("submitDecision requires decision".to_string())
                })?,
            },
            "updatePlatformReadyTime" => InboundCommand::TimerEcho,
            _ => InboundCommand::Unknown(action),
        };
        Ok(command)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Map the legacy `centre` spelling onto `center`.
#[must_use]
pub fn normalize_position(judge_id: &str) -> String {
    if judge_id.eq_ignore_ascii_case("centre") {
        POSITION_CENTER.to_string()
    } else {
        judge_id.to_string()
    }
}

/// One active Next-Attempt countdown as shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    /// 1-based position among active timers.
    pub index: usize,
    pub time_left: u64,
}

/// Outbound record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "action",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    JudgeSubmitted {
        judge_id: String,
        meet_name: String,
    },
    DisplayResults {
        left_decision: String,
        center_decision: String,
        right_decision: String,
        meet_name: String,
    },
    ClearResults {
        meet_name: String,
    },
    StartTimer {
        meet_name: String,
    },
    ResetTimer {
        meet_name: String,
    },
    ResetLights {
        meet_name: String,
    },
    UpdatePlatformReadyTime {
        time_left: u64,
        index: usize,
        meet_name: String,
    },
    PlatformReadyExpired {
        meet_name: String,
    },
    UpdateNextAttemptTime {
        timers: Vec<TimerView>,
        meet_name: String,
    },
    NextAttemptExpired {
        index: usize,
        meet_name: String,
    },
    RefereeHealth {
        #[serde(rename = "connectedRefIDs")]
        connected_ref_ids: Vec<String>,
        connected_referees: usize,
        required_referees: usize,
        meet_name: String,
    },
    ServerShutdown {
        reason: String,
    },
}

impl ServerMessage {
    /// The `action` tag, for logging.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            ServerMessage::JudgeSubmitted { .. } => "judgeSubmitted",
            ServerMessage::DisplayResults { .. } => "displayResults",
            ServerMessage::ClearResults { .. } => "clearResults",
            ServerMessage::StartTimer { .. } => "startTimer",
            ServerMessage::ResetTimer { .. } => "resetTimer",
            ServerMessage::ResetLights { .. } => "resetLights",
            ServerMessage::UpdatePlatformReadyTime { .. } => "updatePlatformReadyTime",
            ServerMessage::PlatformReadyExpired { .. } => "platformReadyExpired",
            ServerMessage::UpdateNextAttemptTime { .. } => "updateNextAttemptTime",
            ServerMessage::NextAttemptExpired { .. } => "nextAttemptExpired",
            ServerMessage::RefereeHealth { .. } => "refereeHealth",
            ServerMessage::ServerShutdown { .. } => "serverShutdown",
        }
    }

    /// The meet this record is scoped to; `None` for process-wide records.
    #[must_use]
    pub fn meet_name(&self) -> Option<&str> {
        match self {
            ServerMessage::JudgeSubmitted { meet_name, .. }
            | ServerMessage::DisplayResults { meet_name, .. }
            | ServerMessage::ClearResults { meet_name }
            | ServerMessage::StartTimer { meet_name }
            | ServerMessage::ResetTimer { meet_name }
            | ServerMessage::ResetLights { meet_name }
            | ServerMessage::UpdatePlatformReadyTime { meet_name, .. }
            | ServerMessage::PlatformReadyExpired { meet_name }
            | ServerMessage::UpdateNextAttemptTime { meet_name, .. }
            | ServerMessage::NextAttemptExpired { meet_name, .. }
            | ServerMessage::RefereeHealth { meet_name, .. } => Some(meet_name),
            ServerMessage::ServerShutdown { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_register_ref() {
        let (message, command) =
            parse_client_message(r#"{"action":"registerRef","meetName":"M1","judgeId":"left"}"#)
                .unwrap();

        assert_eq!(message.meet_name.as_deref(), Some("M1"));
        assert_eq!(
            command,
            InboundCommand::RegisterRef {
                judge_id: "left".to_string()
            }
        );
    }

    #[test]
    fn test_register_ref_without_judge_is_malformed() {
        let result = parse_client_message(r#"{"action":"registerRef","meetName":"M1"}"#);
        assert!(matches!(result, Err(LightsError::MalformedMessage(_))));

        let result = parse_client_message(r#"{"action":"registerRef","judgeId":"  "}"#);
        assert!(matches!(result, Err(LightsError::MalformedMessage(_))));
    }

    #[test]
    fn test_submit_decision_requires_decision_but_not_judge() {
        let (_, command) =
            parse_client_message(r#"{"action":"submitDecision","decision":"good"}"#).unwrap();
        assert_eq!(
            command,
            InboundCommand::SubmitDecision {
                judge_id: None,
                decision: "good".to_string()
            }
        );

        let result = parse_client_message(r#"{"action":"submitDecision","judgeId":"left"}"#);
        assert!(matches!(result, Err(LightsError::MalformedMessage(_))));
    }

    #[test]
    fn test_legacy_bare_decision() {
        let (_, command) =
            parse_client_message(r#"{"meetName":"M1","judgeId":"right","decision":"red"}"#)
                .unwrap();
        assert_eq!(
            command,
            InboundCommand::SubmitDecision {
                judge_id: Some("right".to_string()),
                decision: "red".to_string()
            }
        );

        let result = parse_client_message(r#"{"meetName":"M1","judgeId":"right"}"#);
        assert!(matches!(result, Err(LightsError::MalformedMessage(_))));
    }

    #[test]
    fn test_centre_normalized_to_center() {
        let (_, command) =
            parse_client_message(r#"{"action":"registerRef","judgeId":"centre"}"#).unwrap();
        assert_eq!(
            command,
            InboundCommand::RegisterRef {
                judge_id: POSITION_CENTER.to_string()
            }
        );
    }

    #[test]
    fn test_judge_id_uppercase_alias_accepted() {
        let (_, command) =
            parse_client_message(r#"{"action":"registerRef","judgeID":"left"}"#).unwrap();
        assert_eq!(command.name(), "registerRef");
    }

    #[test]
    fn test_control_and_unknown_actions() {
        for (action, expected) in [
            ("startTimer", InboundCommand::StartTimer),
            ("resetTimer", InboundCommand::ResetTimer),
            ("resetLights", InboundCommand::ResetLights),
            ("startNextAttemptTimer", InboundCommand::StartNextAttemptTimer),
            ("updatePlatformReadyTime", InboundCommand::TimerEcho),
            (
                "highlightLifter",
                InboundCommand::Unknown("highlightLifter".to_string()),
            ),
        ] {
            let text = json!({ "action": action, "meetName": "M1" }).to_string();
            let (_, command) = parse_client_message(&text).unwrap();
            assert_eq!(command, expected, "action {action}");
        }
    }

    #[test]
    fn test_non_object_frame_is_malformed() {
        assert!(matches!(
            parse_client_message("not json"),
            Err(LightsError::MalformedMessage(_))
        ));
        assert!(matches!(
            parse_client_message("[1,2,3]"),
            Err(LightsError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_display_results_wire_shape() {
        let message = ServerMessage::DisplayResults {
            left_decision: "good".to_string(),
            center_decision: "no lift".to_string(),
            right_decision: String::new(),
            meet_name: "M1".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "action": "displayResults",
                "leftDecision": "good",
                "centerDecision": "no lift",
                "rightDecision": "",
                "meetName": "M1",
            })
        );
    }

    #[test]
    fn test_referee_health_wire_shape() {
        let message = ServerMessage::RefereeHealth {
            connected_ref_ids: vec!["center".to_string(), "left".to_string()],
            connected_referees: 2,
            required_referees: 3,
            meet_name: "M1".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "action": "refereeHealth",
                "connectedRefIDs": ["center", "left"],
                "connectedReferees": 2,
                "requiredReferees": 3,
                "meetName": "M1",
            })
        );
    }

    #[test]
    fn test_next_attempt_wire_shape() {
        let message = ServerMessage::UpdateNextAttemptTime {
            timers: vec![
                TimerView {
                    index: 1,
                    time_left: 12,
                },
                TimerView {
                    index: 2,
                    time_left: 58,
                },
            ],
            meet_name: "M1".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&message).unwrap(),
            json!({
                "action": "updateNextAttemptTime",
                "timers": [
                    { "index": 1, "timeLeft": 12 },
                    { "index": 2, "timeLeft": 58 },
                ],
                "meetName": "M1",
            })
        );
    }

    #[test]
    fn test_action_tag_matches_serialized_action() {
        let messages = [
            ServerMessage::ClearResults {
                meet_name: "M1".to_string(),
            },
            ServerMessage::PlatformReadyExpired {
                meet_name: "M1".to_string(),
            },
            ServerMessage::NextAttemptExpired {
                index: 1,
                meet_name: "M1".to_string(),
            },
            ServerMessage::ServerShutdown {
                reason: "maintenance".to_string(),
            },
        ];
        for message in &messages {
            let value = serde_json::to_value(message).unwrap();
            assert_eq!(value["action"], message.action());
        }
    }

    #[test]
    fn test_meet_name_scope() {
        let scoped = ServerMessage::ResetLights {
            meet_name: "M1".to_string(),
        };
        assert_eq!(scoped.meet_name(), Some("M1"));

        let global = ServerMessage::ServerShutdown {
            reason: "shutdown".to_string(),
        };
        assert_eq!(global.meet_name(), None);
    }
}
