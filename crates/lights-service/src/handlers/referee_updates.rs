//! WebSocket upgrade for referee and display pages.
//!
//! `GET /referee-updates?meetName=<name>`
//!
//! The meet is fixed for the lifetime of the connection. A request without a
//! meet is refused with 400 before any upgrade is attempted.

use crate::actors::ConnectionActor;
use crate::errors::LightsError;
use crate::routes::AppState;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefereeUpdatesQuery {
    #[serde(default)]
    pub meet_name: Option<String>,
}

#[instrument(skip_all, name = "lights.connection.upgrade")]
pub async fn referee_updates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RefereeUpdatesQuery>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let Some(meet_name) = query
        .meet_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
    else {
        return LightsError::MissingMeetName.into_response();
    };

    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    let service = Arc::clone(&state.service);
    let max_message_bytes = service.connection_settings().max_message_bytes;
    info!(
        target: "lights.connection",
        meet_name = %meet_name,
        "Upgrading referee-updates connection"
    );

    upgrade
        .max_message_size(max_message_bytes)
        .max_frame_size(max_message_bytes)
        .on_upgrade(move |socket| ConnectionActor::new(meet_name, service).serve(socket))
}
