//! Liveness endpoint.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

/// Liveness response.
///
/// The pod fields come from the Kubernetes downward API and are omitted
/// when not set.
#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    /// Service status.
    pub status: &'static str,
    /// Service version.
    pub build: &'static str,
    /// Host name of the machine serving the request.
    pub host: String,
    /// Pod name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod: Option<String>,
    /// Pod IP address.
    #[serde(rename = "podIP", skip_serializing_if = "Option::is_none")]
    pub pod_ip: Option<String>,
    /// Node the pod runs on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Kubernetes namespace.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Liveness handler.
///
/// Public and not counted by the metrics middleware.
///
/// # Example
///
/// ```text
/// GET /debug/liveness
///
/// Response: 200 OK
/// {
///   "status": "up",
///   "build": "0.1.0",
///   "host": "sales-api-7d9c"
/// }
/// ```
pub async fn liveness() -> impl IntoResponse {
    let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

    let response = LivenessResponse {
        status: "up",
        build: env!("CARGO_PKG_VERSION"),
        host: var("HOSTNAME").unwrap_or_else(|| "unavailable".to_string()),
        pod: var("KUBERNETES_PODNAME"),
        pod_ip: var("KUBERNETES_NAMESPACE_POD_IP"),
        node: var("KUBERNETES_NODENAME"),
        namespace: var("KUBERNETES_NAMESPACE"),
    };

    (StatusCode::OK, Json(response))
}
