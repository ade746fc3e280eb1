//! HTTP gateway for the sales service.
//!
//! This crate puts every route behind a fixed middleware pipeline:
//!
//! - Per-request trace ids and timestamps
//! - Request and error counting
//! - Error logging, with shutdown on composition defects
//! - Panic recovery
//! - Bearer-token authentication and role authorization
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Clients                               │
//! │                  Authorization: Bearer                       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      sales-gateway                           │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │  Metrics /  │ │   Panic     │ │  Authenticate /     │   │
//! │  │  Errors     │ │   Recovery  │ │  Authorize          │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                       ┌──────────────┐
//!                       │  sales-auth  │
//!                       │  (tokens)    │
//!                       └──────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sales_gateway::{create_router, GatewayConfig, GatewayState};
//! use sales_auth::{AuthConfig, Authenticator, FsKeyStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let keys = FsKeyStore::open("zarf/keys", config.auth.algorithm()?)?;
//! let authenticator = Arc::new(Authenticator::new(&config.auth, Arc::new(keys))?);
//!
//! let state = GatewayState::new(authenticator, config);
//! let app = create_router(state);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod compose;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mid;
pub mod routes;
pub mod shutdown;
pub mod state;

pub use compose::{Access, App, Chain, Middleware};
pub use config::GatewayConfig;
pub use error::{ApiError, ReportedError};
pub use routes::create_router;
pub use shutdown::ShutdownSignal;
pub use state::GatewayState;

// Re-export key types for convenience
pub use mid::{AuthUser, Authenticated, Metrics, MetricsSnapshot, RequestValues, RequiredRoles};
