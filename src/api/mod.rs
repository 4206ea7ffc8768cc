//! HTTP policy-decision surface.

use crate::{
    policy::{SessionLimit, SessionLimitEvaluator},
    registry::{SessionRegistry, SessionTerminator},
};
use anyhow::Result;
use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Method, Request},
    routing::{delete, get, post},
    Extension, Router,
};
use secrecy::SecretString;
use std::{fmt, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;

use handlers::{health, session_limit, sessions};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        session_limit::session_limit,
        sessions::list_sessions,
        sessions::terminate_session,
    ),
    components(schemas(
        health::Health,
        session_limit::SessionLimitRequest,
        session_limit::SessionLimitResponse,
        sessions::SessionList,
        crate::registry::ActiveSession,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "sessions", description = "Session limit decisions and active sessions"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Shared handler state.
pub struct AppState {
    pub registry: Arc<dyn SessionRegistry>,
    pub terminator: Option<Arc<dyn SessionTerminator>>,
    pub evaluator: SessionLimitEvaluator,
    pub default_limit: SessionLimit,
    /// Required as a bearer token by the session listing and termination routes.
    pub admin_token: Option<SecretString>,
}

impl AppState {
    #[must_use]
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        terminator: Option<Arc<dyn SessionTerminator>>,
        default_limit: SessionLimit,
    ) -> Self {
        Self {
            evaluator: SessionLimitEvaluator::new(registry.clone()),
            registry,
            terminator,
            default_limit,
            admin_token: None,
        }
    }

    #[must_use]
    pub fn with_admin_token(mut self, token: SecretString) -> Self {
        self.admin_token = Some(token);
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("terminator", &self.terminator.is_some())
            .field("default_limit", &self.default_limit)
            .field("admin_token", &self.admin_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the application router with all layers.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/health", get(health::health).options(health::health))
        .route("/v1/session-limit", post(session_limit::session_limit))
        .route(
            "/v1/principals/:principal/sessions",
            get(sessions::list_sessions),
        )
        .route(
            "/v1/sessions/:session_id",
            delete(sessions::terminate_session),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state)),
        )
}

/// Serve the API until interrupted.
///
/// # Errors
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = request.uri().path(),
        request_id
    )
}
