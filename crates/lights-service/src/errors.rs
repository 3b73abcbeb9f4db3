//! Referee lights error types.
//!
//! Errors are grouped by fault class (transport, protocol, state, resource).
//! None of them is process-fatal: a transport fault tears down one connection,
//! a protocol or state fault discards one message, a resource fault drops one
//! delivery. Internal details are logged server-side but not exposed to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Referee lights error type.
#[derive(Debug, Error)]
pub enum LightsError {
    /// Read/write failure or malformed frame on one connection.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Inbound frame exceeded the configured size limit.
    #[error("Frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },

    /// Inbound record could not be decoded or lacks a required field.
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Connection attempt without a `meetName` parameter.
    #[error("No meet selected")]
    MissingMeetName,

    /// Decision submitted by a connection that never sent `registerRef`.
    #[error("Decision from unregistered judge")]
    UnregisteredJudge,

    /// Decision names a position other than the one the connection holds.
    #[error("Judge {registered} cannot submit for {claimed}")]
    JudgeMismatch { registered: String, claimed: String },

    /// No state exists for the requested meet.
    #[error("Meet not found: {0}")]
    MeetNotFound(String),

    /// A bounded queue was full and the message was dropped.
    #[error("Queue full: {0}")]
    QueueFull(&'static str),

    /// A queue's receiving side has gone away.
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),
}

impl LightsError {
    /// Bounded label for metrics (`error_type`).
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            LightsError::Transport(_) => "transport",
            LightsError::FrameTooLarge { .. } => "frame_too_large",
            LightsError::MalformedMessage(_) => "malformed_message",
            LightsError::MissingMeetName => "missing_meet_name",
            LightsError::UnregisteredJudge => "unregistered_judge",
            LightsError::JudgeMismatch { .. } => "judge_mismatch",
            LightsError::MeetNotFound(_) => "meet_not_found",
            LightsError::QueueFull(_) => "queue_full",
            LightsError::ChannelClosed(_) => "channel_closed",
        }
    }

    /// HTTP status for errors that surface on an HTTP route.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            LightsError::MissingMeetName | LightsError::MalformedMessage(_) => {
                StatusCode::BAD_REQUEST
            }
            LightsError::UnregisteredJudge | LightsError::JudgeMismatch { .. } => {
                StatusCode::FORBIDDEN
            }
            LightsError::MeetNotFound(_) => StatusCode::NOT_FOUND,
            LightsError::FrameTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            LightsError::QueueFull(_) => StatusCode::SERVICE_UNAVAILABLE,
            LightsError::Transport(_) | LightsError::ChannelClosed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            LightsError::MissingMeetName => "No meet selected".to_string(),
            LightsError::MeetNotFound(_) => "Meet not found".to_string(),
            LightsError::MalformedMessage(_) => "Malformed request".to_string(),
            LightsError::FrameTooLarge { limit, .. } => {
                format!("Message exceeds {limit} bytes")
            }
            LightsError::UnregisteredJudge => "Judge is not registered".to_string(),
            LightsError::JudgeMismatch { .. } => {
                "Decision does not match the registered judge".to_string()
            }
            LightsError::QueueFull(_) => "Server is busy, please retry".to_string(),
            LightsError::Transport(_) | LightsError::ChannelClosed(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

impl IntoResponse for LightsError {
    fn into_response(self) -> Response {
        (self.status_code(), self.client_message()).into_response()
    }
}

impl From<serde_json::Error> for LightsError {
    fn from(err: serde_json::Error) -> Self {
        LightsError::MalformedMessage(err.to_string())
    }
}
