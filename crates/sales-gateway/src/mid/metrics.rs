//! Request metrics.
//!
//! A [`Metrics`] registry is built once at startup and handed to the
//! [`metrics`] middleware by reference. Counters only ever grow; the
//! concurrency gauge is refreshed every `sample_every` requests.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde::Serialize;

use crate::error::ReportedError;

/// Process metrics counters.
#[derive(Debug)]
pub struct Metrics {
    requests: AtomicU64,
    errors: AtomicU64,
    active: AtomicI64,
    in_flight: AtomicI64,
    sample_every: u64,
    exclude_prefix: String,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Requests counted so far.
    pub requests: u64,
    /// Requests that ended in an error.
    pub errors: u64,
    /// Concurrent requests at the last sample.
    pub active: i64,
}

impl Metrics {
    /// Create a registry that samples concurrency every `sample_every`
    /// requests and ignores paths under `exclude_prefix`.
    #[must_use]
    pub fn new(sample_every: u64, exclude_prefix: impl Into<String>) -> Self {
        Self {
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            active: AtomicI64::new(0),
            in_flight: AtomicI64::new(0),
            sample_every: sample_every.max(1),
            exclude_prefix: exclude_prefix.into(),
        }
    }

    /// Read the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
        }
    }

    /// Returns `true` if requests for `path` are not counted.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        !self.exclude_prefix.is_empty() && path.starts_with(&self.exclude_prefix)
    }

    fn enter(&self) -> InFlight<'_> {
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        InFlight(self)
    }

    fn record(&self, failed: bool) {
        let n = self.requests.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.sample_every == 0 {
            self.active
                .store(self.in_flight.load(Ordering::Relaxed), Ordering::Relaxed);
        }
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

struct InFlight<'a>(&'a Metrics);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Count the request once the rest of the chain has produced a response.
///
/// A request counts as an error when the response carries a
/// [`ReportedError`]. The response itself passes through untouched.
pub async fn metrics(State(metrics): State<Arc<Metrics>>, req: Request, next: Next) -> Response {
    if metrics.is_excluded(req.uri().path()) {
        return next.run(req).await;
    }

    let _in_flight = metrics.enter();
    let response = next.run(req).await;
    metrics.record(response.extensions().get::<ReportedError>().is_some());
    response
}
