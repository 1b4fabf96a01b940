//! HTTP transport: the stable URL+query shape of spec.md §6. Thin over the
//! resolvers — no business logic lives here, only extraction, cancellation
//! wiring, and error translation (axum's `IntoResponse` for
//! [`crate::errors::ApiError`] does the status-code mapping).

use super::handlers;
use crate::bundles::BundleManagerClient;
use crate::resolvers::Resolvers;
use anyhow::{Context, Result};
use axum::Router;
use axum::http::Method;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

/// Shared state for every request handler: the resolvers and a shutdown
/// token every in-flight request's own cancellation token is a child of.
#[derive(Clone)]
pub struct ApiState {
    pub resolvers: Resolvers<BundleManagerClient>,
    pub shutdown: CancellationToken,
}

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/definitions", get(handlers::definitions))
        .route("/references", get(handlers::references))
        .route("/hover", get(handlers::hover))
        .route("/exists", get(handlers::exists))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::OPTIONS]),
        )
        .with_state(state)
}

pub async fn run_api(
    bind_address: &str,
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!("query server listening on {bind_address}");
    axum::serve(listener, build_api_router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}
