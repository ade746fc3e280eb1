//! Gateway application state.
//!
//! This module defines the shared state that is available to all request handlers.

use std::sync::Arc;

use sales_auth::TokenValidator;

use crate::config::GatewayConfig;
use crate::mid::metrics::Metrics;
use crate::shutdown::ShutdownSignal;

/// Shared application state for the gateway.
///
/// This struct holds references to all services needed by the middleware
/// and HTTP handlers.
pub struct GatewayState<V>
where
    V: TokenValidator,
{
    /// The token validator for authentication.
    pub validator: Arc<V>,
    /// Request and error counters.
    pub metrics: Arc<Metrics>,
    /// Raised when the pipeline detects a composition defect.
    pub shutdown: ShutdownSignal,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl<V> GatewayState<V>
where
    V: TokenValidator,
{
    /// Create a new gateway state with fresh metrics and shutdown signal.
    #[must_use]
    pub fn new(validator: Arc<V>, config: GatewayConfig) -> Self {
        let metrics = Arc::new(Metrics::new(
            config.metrics_sample_every,
            config.debug_prefix.clone(),
        ));
        Self {
            validator,
            metrics,
            shutdown: ShutdownSignal::new(),
            config,
        }
    }

    /// Use an existing shutdown signal, e.g. one `main` is already waiting on.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl<V> Clone for GatewayState<V>
where
    V: TokenValidator,
{
    fn clone(&self) -> Self {
        Self {
            validator: Arc::clone(&self.validator),
            metrics: Arc::clone(&self.metrics),
            shutdown: self.shutdown.clone(),
            config: self.config.clone(),
        }
    }
}
