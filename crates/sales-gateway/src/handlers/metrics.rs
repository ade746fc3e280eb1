//! Metrics snapshot endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use sales_auth::TokenValidator;

use crate::mid::MetricsSnapshot;
use crate::state::GatewayState;

/// Return the current request counters. ADMIN only.
pub async fn metrics<V>(State(state): State<Arc<GatewayState<V>>>) -> Json<MetricsSnapshot>
where
    V: TokenValidator + 'static,
{
    Json(state.metrics.snapshot())
}
