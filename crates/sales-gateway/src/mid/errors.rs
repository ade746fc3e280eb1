//! Error reporting.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::values::RequestValues;
use crate::error::{ApiError, ReportedError};
use crate::shutdown::ShutdownSignal;

/// Log every failed request once and escalate composition defects.
///
/// Failures reach this middleware as a [`ReportedError`] on the response;
/// the response goes back to the client unchanged. A failure marked for
/// shutdown raises `shutdown`.
pub async fn errors(State(shutdown): State<ShutdownSignal>, req: Request, next: Next) -> Response {
    let Some(values) = req.extensions().get::<RequestValues>().copied() else {
        let err = ApiError::ContextMissing("request values missing from context");
        tracing::error!(error = %err, "Request rejected");
        shutdown.signal(err.to_string());
        return err.into_response();
    };

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;

    if let Some(reported) = response.extensions().get::<ReportedError>() {
        let status = response.status();
        if status.is_server_error() {
            tracing::error!(
                trace_id = %values.trace_id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                kind = reported.kind,
                error = %reported.detail,
                "Request failed"
            );
        } else {
            tracing::warn!(
                trace_id = %values.trace_id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                kind = reported.kind,
                error = %reported.detail,
                "Request failed"
            );
        }

        if reported.shutdown {
            shutdown.signal(reported.detail.clone());
        }
    }

    response
}
