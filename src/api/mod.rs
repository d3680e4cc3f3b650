//! Server assembly: routes, layers and lifecycle.

use crate::{backend, gate};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::{Extension, MatchedPath},
    http::{HeaderName, HeaderValue, Request},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
mod openapi;
pub mod state;

pub use openapi::openapi;
pub use state::AppConfig;

/// Build the application router around an injected backend client.
///
/// Every route sits behind the session gate; the gate in turn sees the
/// client and config through request extensions.
#[must_use]
pub fn router(client: backend::Client, config: Arc<AppConfig>) -> Router {
    Router::new()
        .route(gate::HOME_PATH, get(handlers::pages::home))
        .route(gate::REGISTER_PATH, get(handlers::pages::register))
        .route(gate::DASHBOARD_PATH, get(handlers::pages::dashboard))
        .route("/health", get(handlers::health::health))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/counter", get(handlers::counter::counter))
        .route("/api/counter/increment", post(handlers::counter::increment))
        .route("/api/counter/events", get(handlers::counter::events))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &Request<Body>| {
                        HeaderValue::from_str(Ulid::new().to_string().as_str()).ok()
                    },
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(config))
                .layer(Extension(client))
                .layer(middleware::from_fn(gate::gate)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, backend_url: &Url, config: AppConfig) -> Result<()> {
    let client = backend::Client::new(backend_url).context("Failed to build backend client")?;
    let app = router(client, Arc::new(config));

    // Signal watcher feeds the shutdown channel.
    let (tx, mut rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {err}");
            return;
        }
        let _ = tx.send(());
    });

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
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
