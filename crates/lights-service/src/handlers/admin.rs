//! Administrative meet handlers.
//!
//! - `GET /admin/meets` - names of meets with live state
//! - `GET /admin/meets/{meet_name}` - snapshot of one meet
//! - `POST /admin/meets/{meet_name}/reset` - discard a meet's state
//!
//! Authentication is provided by whatever fronts these routes.

use crate::errors::LightsError;
use crate::routes::AppState;
use crate::service::MeetSnapshot;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeetList {
    pub meets: Vec<String>,
}

#[instrument(skip_all, name = "lights.admin.list_meets")]
pub async fn list_meets(State(state): State<Arc<AppState>>) -> Json<MeetList> {
    Json(MeetList {
        meets: state.service.meet_names().await,
    })
}

/// Handler for GET /admin/meets/{meet_name}
///
/// # Response
///
/// - 200 OK: `MeetSnapshot`
/// - 404 Not Found: meet has no state
#[instrument(skip_all, name = "lights.admin.get_meet", fields(meet_name = %meet_name))]
pub async fn get_meet(
    State(state): State<Arc<AppState>>,
    Path(meet_name): Path<String>,
) -> Result<Json<MeetSnapshot>, LightsError> {
    Ok(Json(state.service.snapshot(&meet_name).await?))
}

/// Handler for POST /admin/meets/{meet_name}/reset
///
/// Equivalent to restarting the meet: pending timers stop, displays are
/// cleared and the next reference starts from empty state.
///
/// # Response
///
/// - 204 No Content: meet reset
/// - 404 Not Found: meet has no state
#[instrument(skip_all, name = "lights.admin.reset_meet", fields(meet_name = %meet_name))]
pub async fn reset_meet(
    State(state): State<Arc<AppState>>,
    Path(meet_name): Path<String>,
) -> Result<StatusCode, LightsError> {
    state.service.reset_meet(&meet_name).await?;
    info!(target: "lights.admin", meet_name = %meet_name, "Meet reset via admin API");
    Ok(StatusCode::NO_CONTENT)
}
