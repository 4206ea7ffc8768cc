use crate::{api::AppState, GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, error, warn};
use utoipa::ToSchema;

const HEALTH_REGISTRY_TIMEOUT_SECONDS: u64 = 2;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    registry: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Session registry is reachable", body = Health),
        (status = 503, description = "Session registry is unreachable", body = Health)
    ),
    tag = "health",
)]
// axum handler for health
pub async fn health(method: Method, state: Extension<Arc<AppState>>) -> impl IntoResponse {
    let registry_healthy = match timeout(
        Duration::from_secs(HEALTH_REGISTRY_TIMEOUT_SECONDS),
        state.registry.ping(),
    )
    .await
    {
        Ok(Ok(())) => {
            debug!("Session registry is healthy");
            true
        }
        Ok(Err(err)) => {
            error!("Failed to ping session registry: {}", err);
            false
        }
        Err(_) => {
            warn!("Session registry health check timed out");
            false
        }
    };

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registry: if registry_healthy {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();
            headers.insert("X-App", x_app_header_value);
            headers
        })
        .map_err(|err| {
            debug!("Failed to parse X-App header: {}", err);
        })
        .unwrap_or_else(|()| HeaderMap::new());

    if registry_healthy {
        (StatusCode::OK, headers, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        policy::SessionLimit,
        registry::{test_support::FixedCountRegistry, MemorySessionRegistry},
    };
    use anyhow::Result;
    use axum::body::to_bytes;

    fn state(registry: Arc<dyn crate::registry::SessionRegistry>) -> Result<Arc<AppState>> {
        Ok(Arc::new(AppState::new(registry, None, SessionLimit::new(2)?)))
    }

    #[tokio::test]
    async fn health_reports_registry_ok() -> Result<()> {
        let state = state(Arc::new(MemorySessionRegistry::new()))?;

        let response = health(Method::GET, Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.name, env!("CARGO_PKG_NAME"));
        assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(health.registry, "ok");
        Ok(())
    }

    #[tokio::test]
    async fn health_options_has_empty_body() -> Result<()> {
        let state = state(Arc::new(MemorySessionRegistry::new()))?;

        let response = health(Method::OPTIONS, Extension(state))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        assert!(body.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn health_unavailable_registry_is_503() -> Result<()> {
        let state = state(Arc::new(FixedCountRegistry::unavailable()))?;

        let response = health(Method::GET, Extension(state)).await.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await?;
        let health: Health = serde_json::from_slice(&body)?;
        assert_eq!(health.registry, "error");
        Ok(())
    }
}
