//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur while issuing or validating tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// The token is not a three-part signed structure, or a segment cannot be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// The token's `kid` is not in the key store.
    #[error("unknown key id")]
    UnknownKeyId,

    /// The signature does not verify under the pinned algorithm and looked-up key.
    #[error("signature is invalid")]
    SignatureInvalid,

    /// The token header names an algorithm other than the pinned one.
    #[error("token signed with an unexpected algorithm")]
    AlgorithmMismatch,

    /// The `exp` claim is not in the future.
    #[error("token is expired")]
    TokenExpired,

    /// The `aud` claim does not contain the expected audience.
    #[error("token audience mismatch")]
    AudienceMismatch,

    /// The `iss` claim does not match the expected issuer.
    #[error("token issuer mismatch")]
    IssuerMismatch,

    /// A role outside the enumerated set.
    #[error("invalid role {0:?}")]
    InvalidRole(String),

    /// Claims handed to issuance violate an invariant.
    #[error("invalid claims: {0}")]
    ClaimsInvalid(String),

    /// No signing material is stored for the key id.
    #[error("signing key not found: {0}")]
    KeyNotFound(String),

    /// Tokens cannot be issued because no active signing key is set.
    #[error("no active signing key")]
    NoActiveKey,

    /// The algorithm is unknown or not in the asymmetric allow-list.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Key material could not be read or parsed.
    #[error("failed to load key {path}: {reason}")]
    KeyLoad {
        /// File or key id the material came from.
        path: String,
        /// Why loading failed.
        reason: String,
    },

    /// Computing the signature failed.
    #[error("signing token: {0}")]
    Signing(String),
}

impl AuthError {
    /// Returns `true` for failures caused by the presented token itself.
    #[must_use]
    pub const fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken(_)
                | Self::UnknownKeyId
                | Self::SignatureInvalid
                | Self::AlgorithmMismatch
                | Self::TokenExpired
                | Self::AudienceMismatch
                | Self::IssuerMismatch
                | Self::InvalidRole(_)
        )
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        if self.is_validation_failure() {
            401
        } else {
            500
        }
    }
}
