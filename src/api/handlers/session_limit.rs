use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::{error, instrument};
use utoipa::ToSchema;

use crate::{
    api::AppState,
    context::{AuthenticationContext, PrincipalId},
    policy::{PolicyError, SessionLimit, SESSION_LIMIT_ATTRIBUTE},
};

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionLimitRequest {
    principal: String,
    /// Positive integer as a string; the server default applies when absent.
    #[serde(rename = "sessionLimit", default, skip_serializing_if = "Option::is_none")]
    session_limit: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct SessionLimitResponse {
    principal: String,
    #[serde(rename = "withinLimit")]
    within_limit: bool,
    #[serde(rename = "sessionLimit")]
    session_limit: u32,
}

#[utoipa::path(
    post,
    path= "/v1/session-limit",
    request_body = SessionLimitRequest,
    responses (
        (status = 200, description = "Session limit verdict", body = SessionLimitResponse),
        (status = 400, description = "Invalid principal or session limit"),
        (status = 503, description = "Session registry unavailable")
    ),
    tag = "sessions",
)]
#[instrument(skip(state))]
pub async fn session_limit(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SessionLimitRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let principal = match PrincipalId::new(request.principal) {
        Ok(principal) => principal,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let limit_value = request
        .session_limit
        .unwrap_or_else(|| state.default_limit.to_string());

    let limit = match SessionLimit::parse(Some(&limit_value)) {
        Ok(limit) => limit,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let context = AuthenticationContext::new(principal);
    let attributes = HashMap::from([(SESSION_LIMIT_ATTRIBUTE.to_string(), limit_value)]);

    match state
        .evaluator
        .is_within_session_limit(&context, &attributes)
        .await
    {
        Ok(within_limit) => (
            StatusCode::OK,
            Json(SessionLimitResponse {
                principal: context.principal().to_string(),
                within_limit,
                session_limit: limit.get(),
            }),
        )
            .into_response(),
        Err(PolicyError::InvalidConfiguration(reason)) => {
            (StatusCode::BAD_REQUEST, reason).into_response()
        }
        Err(err @ PolicyError::RegistryUnavailable(_)) => {
            error!("Failed to evaluate session limit: {}", err);
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}
