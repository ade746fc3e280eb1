//! Token claim structures.
//!
//! [`Claims`] is the identity and authorization payload embedded in every
//! signed token. It is built at login time, serialized at issuance, and
//! re-validated on every request that presents the token.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sales_core::Role;

use crate::error::{AuthError, Result};

/// Identity and authorization payload carried by a signed token.
///
/// # Wire fields
///
/// - `sub`: opaque principal identifier
/// - `roles`: role tags, order irrelevant, duplicates tolerated
/// - `iss`: issuing service
/// - `aud`: intended audience
/// - `iat`: issued-at (Unix seconds)
/// - `exp`: expiry (Unix seconds)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// The authenticated principal (subject claim).
    #[serde(rename = "sub")]
    pub subject: String,
    /// Roles held by the principal.
    pub roles: Vec<Role>,
    /// Issuing service (issuer claim).
    #[serde(rename = "iss")]
    pub issuer: String,
    /// Intended audience (audience claim).
    #[serde(rename = "aud")]
    pub audience: String,
    /// When the token was issued.
    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,
    /// When the token stops being valid.
    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    /// Returns `true` if the claims hold at least one of `required`.
    #[must_use]
    pub fn authorized(&self, required: &[Role]) -> bool {
        self.roles.iter().any(|held| required.contains(held))
    }

    /// Check the invariants issuance relies on.
    ///
    /// Role membership is enforced by [`Role`] itself, so only the subject
    /// and the validity window are checked here.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClaimsInvalid`] if the subject is empty or the
    /// token would expire before (or at) the moment it was issued.
    pub fn validate(&self) -> Result<()> {
        if self.subject.trim().is_empty() {
            return Err(AuthError::ClaimsInvalid("subject is empty".to_string()));
        }
        if self.expires_at <= self.issued_at {
            return Err(AuthError::ClaimsInvalid(
                "expires_at must be after issued_at".to_string(),
            ));
        }
        Ok(())
    }
}
