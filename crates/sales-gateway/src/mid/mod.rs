//! Request middleware.
//!
//! Each middleware is an `axum::middleware::from_fn` function. The order they
//! wrap a route in is decided by [`crate::compose`].

pub mod auth;
pub mod errors;
pub mod metrics;
pub mod panics;
pub mod values;

pub use auth::{authenticate, authorize, AuthUser, Authenticated, RequiredRoles};
pub use errors::errors;
pub use metrics::{metrics, Metrics, MetricsSnapshot};
pub use panics::panics;
pub use values::{values, RequestValues};
