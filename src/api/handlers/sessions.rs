use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;

use super::admin::verify_admin_token;
use crate::{api::AppState, context::PrincipalId, registry::ActiveSession};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionList {
    sessions: Vec<ActiveSession>,
}

#[utoipa::path(
    get,
    path= "/v1/principals/{principal}/sessions",
    params(
        ("principal" = String, Path, description = "Principal identifier, optionally USERSTORE/user@tenant")
    ),
    responses (
        (status = 200, description = "Active sessions, newest first", body = SessionList),
        (status = 400, description = "Invalid principal"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 503, description = "Session registry unavailable")
    ),
    tag = "sessions",
)]
#[instrument(skip(headers, state))]
pub async fn list_sessions(
    headers: HeaderMap,
    Path(principal): Path<String>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = verify_admin_token(&headers, &state) {
        return status.into_response();
    }

    let principal = match PrincipalId::new(principal) {
        Ok(principal) => principal,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    match state.registry.active_sessions(&principal).await {
        Ok(sessions) => (StatusCode::OK, Json(SessionList { sessions })).into_response(),
        Err(err) => {
            error!("Failed to list sessions: {}", err);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path= "/v1/sessions/{session_id}",
    params(
        ("session_id" = String, Path, description = "Session identifier")
    ),
    responses (
        (status = 204, description = "Session terminated"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Unknown session"),
        (status = 501, description = "Session registry is read-only"),
        (status = 503, description = "Session registry unavailable")
    ),
    tag = "sessions",
)]
#[instrument(skip(headers, state))]
pub async fn terminate_session(
    headers: HeaderMap,
    Path(session_id): Path<String>,
    state: Extension<Arc<AppState>>,
) -> impl IntoResponse {
    if let Err(status) = verify_admin_token(&headers, &state) {
        return status;
    }

    let Some(terminator) = &state.terminator else {
        return StatusCode::NOT_IMPLEMENTED;
    };

    match terminator.terminate_session(&session_id).await {
        Ok(true) => {
            info!("Session terminated");
            StatusCode::NO_CONTENT
        }
        Ok(false) => StatusCode::NOT_FOUND,
        Err(err) => {
            error!("Failed to terminate session: {}", err);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
