use anyhow::{Context, Result, anyhow};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Json},
    routing::get,
};
use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{Span, info, info_span};
use ulid::Ulid;
use url::Url;

use crate::{
    actions::Backends,
    invitations::HttpInvitationProvider,
    revalidate::{ViewInvalidator, spawn_listener},
    rpc::AppRouter,
    service::{Services, postgres::PgBackend},
};

pub mod handlers;
mod openapi;
pub mod session;

pub use openapi::openapi;
pub use session::{PgSessionResolver, SessionResolver};

/// Server settings resolved by the CLI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub dsn: String,
    pub db_max_connections: u32,
    pub frontend_base_url: String,
    pub auth_provider_url: String,
    pub auth_provider_secret_key: SecretString,
}

/// Per-process request state shared through an `Extension` layer.
#[derive(Clone)]
pub struct ApiState {
    pub router: AppRouter,
    pub sessions: Arc<dyn SessionResolver>,
}

/// Routes without middleware.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health).options(handlers::health))
        .route(
            "/rpc/:procedure",
            get(handlers::rpc::query).post(handlers::rpc::mutation),
        )
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(Extension(state))
}

async fn openapi_json() -> impl IntoResponse {
    Json(openapi())
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(config: ServerConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.db_max_connections)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&config.dsn)
        .await
        .context("Failed to connect to database")?;

    let invalidator = ViewInvalidator::new();
    let _listener = spawn_listener(&invalidator);

    let invitations =
        HttpInvitationProvider::new(&config.auth_provider_url, config.auth_provider_secret_key)?;

    let backends = Backends {
        services: Services::from_backend(Arc::new(PgBackend::new(pool.clone()))),
        revalidator: Arc::new(invalidator),
        invitations: Arc::new(invitations),
    };
    let state = ApiState {
        router: AppRouter::new(backends),
        sessions: Arc::new(PgSessionResolver::new(pool)),
    };

    let frontend_origin = frontend_origin(&config.frontend_base_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin))
        .allow_credentials(true);

    let app = router(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(cors),
    );

    let listener = TcpListener::bind(format!("::0:{}", config.port)).await?;

    info!("Listening on [::]:{}", config.port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {err}");
        return;
    }
    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    HeaderValue::from_str(&format!("{}://{host}{port}", parsed.scheme()))
        .context("Failed to build frontend origin header")
}
