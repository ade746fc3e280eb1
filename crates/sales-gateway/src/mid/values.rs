//! Per-request values.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};

use sales_core::TraceId;

/// Values every request carries through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestValues {
    /// Identifies the request in logs.
    pub trace_id: TraceId,
    /// When the request entered the chain.
    pub now: DateTime<Utc>,
}

impl RequestValues {
    /// Fresh values for a request arriving now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trace_id: TraceId::generate(),
            now: Utc::now(),
        }
    }
}

impl RequestValues {
    /// Time spent since the request entered the chain.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.now
    }
}

impl Default for RequestValues {
    fn default() -> Self {
        Self::new()
    }
}

/// Attach [`RequestValues`] to the request and log it once it completes.
/// Must wrap every other middleware.
pub async fn values(mut req: Request, next: Next) -> Response {
    let values = RequestValues::new();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    tracing::debug!(trace_id = %values.trace_id, method = %method, path = %path, "Request started");

    req.extensions_mut().insert(values);
    let response = next.run(req).await;

    tracing::info!(
        trace_id = %values.trace_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        elapsed_ms = values.elapsed().num_milliseconds(),
        "Request completed"
    );
    response
}
