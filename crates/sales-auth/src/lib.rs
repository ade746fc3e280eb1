//! Signed-token authentication for the sales service.
//!
//! This crate issues and verifies asymmetric-signed tokens carrying a
//! subject and a set of [`Role`](sales_core::Role)s:
//!
//! - Key storage keyed by `kid`, in memory or loaded from a directory of PEM files
//! - Token issuance with the active signing key
//! - Validation pinned to one configured algorithm
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │   Gateway        │────▶│  TokenValidator  │
//! │   (HTTP)         │     │  (trait)         │
//! └──────────────────┘     └────────┬─────────┘
//!                                   │
//!                          ┌────────▼─────────┐
//!                          │  Authenticator   │
//!                          │  (impl)          │
//!                          └────────┬─────────┘
//!                                   │ kid
//!                          ┌────────▼─────────┐
//!                          │  KeyLookup       │
//!                          │  (key store)     │
//!                          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use sales_auth::{AuthConfig, Authenticator, FsKeyStore, TokenValidator};
//! use sales_core::Role;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::default();
//! let keys = FsKeyStore::open("zarf/keys", config.algorithm()?)?;
//!
//! let auth = Authenticator::new(&config, Arc::new(keys))?;
//! auth.set_active_kid(&config.active_kid)?;
//!
//! let claims = auth.claims_for("user-1", vec![Role::Admin], Duration::from_secs(3600))?;
//! let token = auth.issue(&claims)?;
//!
//! let parsed = auth.validate(&token)?;
//! assert_eq!(parsed.subject, "user-1");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

pub mod claims;
pub mod clock;
pub mod error;
pub mod jwt;
pub mod keystore;

pub use claims::Claims;
pub use clock::{Clock, FixedClock, SystemClock};
pub use error::{AuthError, Result};
pub use jwt::{Authenticator, TokenValidator};
pub use keystore::{FsKeyStore, KeyLookup, KeyMaterial, MemoryKeyStore};

#[cfg(any(test, feature = "test-utils"))]
pub use jwt::MockTokenValidator;

/// Key id of the development signing key.
pub const DEFAULT_ACTIVE_KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";

/// Configuration for token issuance and validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signing algorithm name (e.g. `RS256`). Must be asymmetric.
    pub algorithm: String,
    /// Expected and stamped issuer (`iss` claim).
    pub issuer: String,
    /// Expected and stamped audience (`aud` claim).
    pub audience: String,
    /// Directory holding `<kid>.pub.pem` and optional `<kid>.pem` files.
    pub keys_dir: Option<PathBuf>,
    /// Key id new tokens are signed with.
    pub active_kid: String,
    /// Lifetime of newly issued tokens, in seconds.
    pub token_ttl_seconds: u64,
}

impl AuthConfig {
    /// The configured algorithm, checked against the asymmetric allow-list.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedAlgorithm`] for unknown or symmetric names.
    pub fn algorithm(&self) -> Result<Algorithm> {
        jwt::parse_algorithm(&self.algorithm)
    }

    /// Lifetime of newly issued tokens.
    #[must_use]
    pub const fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_seconds)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            algorithm: "RS256".to_string(),
            issuer: "service project".to_string(),
            audience: "students".to_string(),
            keys_dir: None,
            active_kid: DEFAULT_ACTIVE_KID.to_string(),
            token_ttl_seconds: 8760 * 60 * 60,
        }
    }
}
