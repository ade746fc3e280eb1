//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use sales_auth::TokenValidator;
use sales_core::Role;

use crate::compose::{Access, App};
use crate::handlers::{claims, health, metrics};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Debug (public, not counted)
/// - `GET /debug/liveness` - Liveness check
///
/// ## Authenticated
/// - `GET /v1/claims` - Claims of the caller
///
/// ## ADMIN only
/// - `GET /v1/admin/metrics` - Request counters
pub fn create_router<V>(state: GatewayState<V>) -> Router
where
    V: TokenValidator + 'static,
{
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;
    let liveness_path = format!("{}/liveness", state.config.debug_prefix);

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    App::new(state)
        .handle(&liveness_path, get(health::liveness), Access::Public)
        .handle("/v1/claims", get(claims::claims), Access::Authenticated)
        .handle(
            "/v1/admin/metrics",
            get(metrics::metrics::<V>),
            Access::Roles(vec![Role::Admin]),
        )
        .into_router()
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
