//! Token issuance and validation.
//!
//! The [`Authenticator`] signs [`Claims`] with a key looked up by `kid` and
//! turns presented tokens back into claims. The signing algorithm is fixed at
//! construction and is the only algorithm ever used for verification, whatever
//! the token header says.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use base64::prelude::*;
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use parking_lot::RwLock;
use serde::Deserialize;

use sales_core::Role;

use crate::claims::Claims;
use crate::clock::{Clock, SystemClock};
use crate::error::{AuthError, Result};
use crate::keystore::{KeyFamily, KeyLookup, KeyMaterial};
use crate::AuthConfig;

/// Trait for turning a presented token into validated claims.
pub trait TokenValidator: Send + Sync {
    /// Validate `token` and extract its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is malformed, signed by an unknown or
    /// wrong key, expired, or carries unexpected claims.
    fn validate(&self, token: &str) -> Result<Claims>;
}

/// Raw payload of a token before its claims are checked.
#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    iss: String,
    #[serde(default)]
    aud: Audience,
    iat: i64,
    exp: i64,
}

/// Audience claim that can be either a string or array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
    #[default]
    None,
}

impl Audience {
    fn contains(&self, value: &str) -> bool {
        match self {
            Self::Single(s) => s == value,
            Self::Multiple(v) => v.iter().any(|s| s == value),
            Self::None => false,
        }
    }
}

/// Issues and validates signed tokens.
///
/// Shared read-only across requests; the key store behind it is the only
/// mutable part and is changed through [`Authenticator::add_key`] and
/// [`Authenticator::remove_key`].
pub struct Authenticator {
    algorithm: Algorithm,
    issuer: String,
    audience: String,
    keys: Arc<dyn KeyLookup>,
    active_kid: RwLock<Option<String>>,
    clock: Arc<dyn Clock>,
    validation: Validation,
}

impl Authenticator {
    /// Create an authenticator pinned to `config.algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm name is
    /// unknown or symmetric.
    pub fn new(config: &AuthConfig, keys: Arc<dyn KeyLookup>) -> Result<Self> {
        let algorithm = config.algorithm()?;

        // Expiry and audience are checked against our own clock and values
        // after the signature verifies.
        let mut validation = Validation::new(algorithm);
        validation.algorithms = vec![algorithm];
        validation.required_spec_claims = HashSet::new();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Ok(Self {
            algorithm,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            keys,
            active_kid: RwLock::new(None),
            clock: Arc::new(SystemClock),
            validation,
        })
    }

    /// Replace the time source used for expiry checks and new claims.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The pinned signing algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The issuer stamped into claims and required on validation.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The audience stamped into claims and required on validation.
    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// The key store backing this authenticator.
    #[must_use]
    pub fn keys(&self) -> &Arc<dyn KeyLookup> {
        &self.keys
    }

    /// Build claims for `subject` valid from now for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClaimsInvalid`] if `ttl` is zero or overflows.
    pub fn claims_for(&self, subject: &str, roles: Vec<Role>, ttl: Duration) -> Result<Claims> {
        let now = self.clock.now();
        let issued_at = DateTime::from_timestamp(now.timestamp(), 0).unwrap_or(now);
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::ClaimsInvalid("token lifetime out of range".to_string()))?;

        let claims = Claims {
            subject: subject.to_string(),
            roles,
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            issued_at,
            expires_at,
        };
        claims.validate()?;
        Ok(claims)
    }

    /// Sign `claims` with the key stored under `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClaimsInvalid`] if the claims break an invariant,
    /// [`AuthError::KeyNotFound`] if `kid` is absent or has no signing
    /// material, and [`AuthError::Signing`] if signing itself fails.
    pub fn generate_token(&self, kid: &str, claims: &Claims) -> Result<String> {
        claims.validate()?;

        let key = self
            .keys
            .lookup(kid)
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))?;
        let signing_key = key
            .signing_key()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))?;

        let mut header = Header::new(self.algorithm);
        header.kid = Some(kid.to_string());

        encode(&header, claims, signing_key).map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Sign `claims` with the active key.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NoActiveKey`] if no active key is set, otherwise
    /// the errors of [`Authenticator::generate_token`].
    pub fn issue(&self, claims: &Claims) -> Result<String> {
        let kid = self.active_kid().ok_or(AuthError::NoActiveKey)?;
        self.generate_token(&kid, claims)
    }

    /// Validate `token` and return its claims.
    ///
    /// The header is parsed without trusting it to find the `kid`. The
    /// signature is then checked with the looked-up key under the pinned
    /// algorithm only, followed by expiry, audience, issuer and roles.
    ///
    /// # Errors
    ///
    /// See [`AuthError::is_validation_failure`] for the kinds returned.
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut segments = token.split('.');
        let (Some(header), Some(_), Some(signature)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(AuthError::MalformedToken(
                "expected three dot-separated segments".to_string(),
            ));
        };

        let kid = decode_header_segment(header)?.kid.ok_or_else(|| {
            AuthError::MalformedToken("missing key id (kid) in token header".to_string())
        })?;

        let key = self.keys.lookup(&kid).ok_or(AuthError::UnknownKeyId)?;

        // A stray '.' past an intact header can only come from a damaged
        // payload or signature.
        if segments.next().is_some() || BASE64_URL_SAFE_NO_PAD.decode(signature).is_err() {
            return Err(AuthError::SignatureInvalid);
        }

        let data = decode::<RawClaims>(token, key.verifying_key(), &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidEcdsaKey
                | ErrorKind::Crypto(_) => AuthError::SignatureInvalid,
                ErrorKind::InvalidAlgorithm | ErrorKind::MissingAlgorithm => {
                    AuthError::AlgorithmMismatch
                }
                _ => AuthError::MalformedToken(e.to_string()),
            })?;

        self.check_claims(data.claims)
    }

    fn check_claims(&self, raw: RawClaims) -> Result<Claims> {
        if raw.exp <= self.clock.now().timestamp() {
            return Err(AuthError::TokenExpired);
        }
        if !raw.aud.contains(&self.audience) {
            return Err(AuthError::AudienceMismatch);
        }
        if raw.iss != self.issuer {
            return Err(AuthError::IssuerMismatch);
        }

        let roles = raw
            .roles
            .iter()
            .map(|r| r.parse::<Role>().map_err(|_| AuthError::InvalidRole(r.clone())))
            .collect::<Result<Vec<_>>>()?;

        let issued_at = DateTime::<Utc>::from_timestamp(raw.iat, 0)
            .ok_or_else(|| AuthError::MalformedToken("invalid iat timestamp".to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(raw.exp, 0)
            .ok_or_else(|| AuthError::MalformedToken("invalid exp timestamp".to_string()))?;

        Ok(Claims {
            subject: raw.sub,
            roles,
            issuer: raw.iss,
            audience: self.audience.clone(),
            issued_at,
            expires_at,
        })
    }

    /// Store `key` under `kid`. Returns the resulting key count.
    pub fn add_key(&self, kid: &str, key: KeyMaterial) -> usize {
        let count = self.keys.add(kid, key);
        tracing::info!(kid = %kid, count, "Added key");
        count
    }

    /// Drop the key stored under `kid`. Returns the resulting key count.
    ///
    /// Tokens signed with `kid` fail with [`AuthError::UnknownKeyId`] from
    /// now on. Removing the active key leaves no active key.
    pub fn remove_key(&self, kid: &str) -> usize {
        let mut active = self.active_kid.write();
        let count = self.keys.remove(kid);
        if active.as_deref() == Some(kid) {
            tracing::warn!(kid = %kid, "Removed the active signing key");
            *active = None;
        }
        tracing::info!(kid = %kid, count, "Removed key");
        count
    }

    /// Start signing new tokens with `kid`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyNotFound`] if `kid` has no signing material.
    pub fn set_active_kid(&self, kid: &str) -> Result<()> {
        // Held across the lookup so a concurrent remove_key cannot slip in.
        let mut active = self.active_kid.write();
        let can_sign = self.keys.lookup(kid).is_some_and(|key| key.can_sign());
        if !can_sign {
            return Err(AuthError::KeyNotFound(kid.to_string()));
        }
        *active = Some(kid.to_string());
        drop(active);
        tracing::info!(kid = %kid, "Active signing key set");
        Ok(())
    }

    /// The key id new tokens are signed with, if any.
    #[must_use]
    pub fn active_kid(&self) -> Option<String> {
        self.active_kid.read().clone()
    }
}

impl TokenValidator for Authenticator {
    fn validate(&self, token: &str) -> Result<Claims> {
        self.validate_token(token)
    }
}

/// Decode the first token segment without trusting it.
fn decode_header_segment(segment: &str) -> Result<Header> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| AuthError::MalformedToken(format!("invalid header encoding: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::MalformedToken(format!("invalid header: {e}")))
}

/// Parse an algorithm name and check it against the asymmetric allow-list.
pub(crate) fn parse_algorithm(name: &str) -> Result<Algorithm> {
    let algorithm: Algorithm = name
        .parse()
        .map_err(|_| AuthError::UnsupportedAlgorithm(name.to_string()))?;
    if KeyFamily::of(algorithm).is_none() {
        return Err(AuthError::UnsupportedAlgorithm(name.to_string()));
    }
    Ok(algorithm)
}

/// A mock token validator for testing.
///
/// Accepts tokens of the form `test-token:<subject>:<ROLE,ROLE>`. The token
/// `test-token:panic` panics inside validation.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Debug, Clone, Default)]
pub struct MockTokenValidator {
    /// Claims configuration used for issuer and audience.
    pub config: AuthConfig,
}

#[cfg(any(test, feature = "test-utils"))]
impl TokenValidator for MockTokenValidator {
    fn validate(&self, token: &str) -> Result<Claims> {
        let rest = token.strip_prefix("test-token:").ok_or_else(|| {
            AuthError::MalformedToken("expected test-token:<subject>:<roles>".to_string())
        })?;

        assert!(rest != "panic", "mock validator asked to panic");

        let (subject, roles) = rest.split_once(':').ok_or_else(|| {
            AuthError::MalformedToken("expected test-token:<subject>:<roles>".to_string())
        })?;

        let roles = roles
            .split(',')
            .filter(|r| !r.is_empty())
            .map(|r| r.parse::<Role>().map_err(|_| AuthError::InvalidRole(r.to_string())))
            .collect::<Result<Vec<_>>>()?;

        let now = Utc::now();
        Ok(Claims {
            subject: subject.to_string(),
            roles,
            issuer: self.config.issuer.clone(),
            audience: self.config.audience.clone(),
            issued_at: now,
            expires_at: now + chrono::Duration::hours(1),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::keystore::tests::{pair_a, pair_b, KID_A, KID_B, PUBLIC_A};
    use crate::keystore::MemoryKeyStore;
    use jsonwebtoken::{decode_header, EncodingKey};

    const NOW: i64 = 1_700_000_000;

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(DateTime::from_timestamp(NOW, 0).unwrap()))
    }

    fn authenticator(clock: Arc<FixedClock>) -> Authenticator {
        let keys = Arc::new(MemoryKeyStore::from_keys([(KID_A, pair_a())]));
        Authenticator::new(&AuthConfig::default(), keys)
            .unwrap()
            .with_clock(clock)
    }

    fn admin_claims(auth: &Authenticator) -> Claims {
        auth.claims_for(
            "5cf37266-3473-4006-984f-9325122678b7",
            vec![Role::Admin],
            Duration::from_secs(3600),
        )
        .unwrap()
    }

    /// Swap one character of `segment` (0 = header, 1 = payload, 2 = signature)
    /// for a different base64url character.
    fn tamper(token: &str, segment: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        let target = &mut parts[segment];
        let idx = target.len() / 2;
        let original = target.as_bytes()[idx];
        let replacement = if original == b'A' { 'B' } else { 'A' };
        target.replace_range(idx..=idx, &replacement.to_string());
        parts.join(".")
    }

    #[test]
    fn new_rejects_symmetric_and_unknown_algorithms() {
        let keys: Arc<dyn KeyLookup> = Arc::new(MemoryKeyStore::new());
        for name in ["HS256", "none", "RS999", ""] {
            let config = AuthConfig {
                algorithm: name.to_string(),
                ..AuthConfig::default()
            };
            let result = Authenticator::new(&config, Arc::clone(&keys));
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn round_trip() {
        let auth = authenticator(clock());
        let claims = admin_claims(&auth);

        let token = auth.generate_token(KID_A, &claims).unwrap();
        assert_eq!(token.split('.').count(), 3);

        let parsed = auth.validate_token(&token).unwrap();
        assert_eq!(parsed, claims);
    }

    #[test]
    fn header_carries_kid_and_pinned_algorithm() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();

        let header = decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some(KID_A));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn generate_with_unknown_kid_fails() {
        let auth = authenticator(clock());
        let result = auth.generate_token("missing", &admin_claims(&auth));
        assert_eq!(result, Err(AuthError::KeyNotFound("missing".to_string())));
    }

    #[test]
    fn generate_with_verify_only_key_fails() {
        let auth = authenticator(clock());
        let public = KeyMaterial::verify_only_from_pem(Algorithm::RS256, PUBLIC_A).unwrap();
        auth.add_key("public-only", public);

        let result = auth.generate_token("public-only", &admin_claims(&auth));
        assert!(matches!(result, Err(AuthError::KeyNotFound(_))));
    }

    #[test]
    fn generate_rejects_invalid_claims() {
        let auth = authenticator(clock());
        let mut claims = admin_claims(&auth);
        claims.subject = String::new();

        let result = auth.generate_token(KID_A, &claims);
        assert!(matches!(result, Err(AuthError::ClaimsInvalid(_))));
    }

    #[test]
    fn tampered_payload_fails_signature() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();

        let result = auth.validate_token(&tamper(&token, 1));
        assert_eq!(result, Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn tampered_signature_fails_signature() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();

        let result = auth.validate_token(&tamper(&token, 2));
        assert_eq!(result, Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn every_single_byte_flip_fails_signature() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();
        let payload_start = token.find('.').unwrap() + 1;

        let mut checked = 0;
        for idx in payload_start..token.len() {
            if token.as_bytes()[idx] == b'.' {
                continue;
            }
            for bit in 0..7 {
                let mut bytes = token.clone().into_bytes();
                bytes[idx] ^= 1 << bit;
                let flipped = String::from_utf8(bytes).unwrap();

                assert_eq!(
                    auth.validate_token(&flipped),
                    Err(AuthError::SignatureInvalid),
                    "flipping bit {bit} of byte {idx} was not caught"
                );
                checked += 1;
            }
        }
        assert!(checked > 1000);
    }

    #[test]
    fn extra_segment_after_valid_header_fails_signature() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();
        let (head, signature) = token.rsplit_once('.').unwrap();
        let (left, right) = signature.split_at(signature.len() / 2);

        let result = auth.validate_token(&format!("{head}.{left}.{right}"));
        assert_eq!(result, Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn undecodable_signature_fails_signature() {
        let auth = authenticator(clock());
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();
        let (head, _) = token.rsplit_once('.').unwrap();

        let result = auth.validate_token(&format!("{head}.!!not-base64!!"));
        assert_eq!(result, Err(AuthError::SignatureInvalid));
    }

    #[test]
    fn expiry_boundary() {
        let clock = clock();
        let auth = authenticator(Arc::clone(&clock));
        let token = auth.generate_token(KID_A, &admin_claims(&auth)).unwrap();

        // One second before expiry.
        clock.advance(chrono::Duration::seconds(3599));
        assert!(auth.validate_token(&token).is_ok());

        // Exactly at expiry.
        clock.advance(chrono::Duration::seconds(1));
        assert_eq!(auth.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn audience_mismatch() {
        let auth = authenticator(clock());
        let mut claims = admin_claims(&auth);
        claims.audience = "other-service".to_string();
        let token = auth.generate_token(KID_A, &claims).unwrap();

        assert_eq!(auth.validate_token(&token), Err(AuthError::AudienceMismatch));
    }

    #[test]
    fn issuer_mismatch() {
        let auth = authenticator(clock());
        let mut claims = admin_claims(&auth);
        claims.issuer = "someone else".to_string();
        let token = auth.generate_token(KID_A, &claims).unwrap();

        assert_eq!(auth.validate_token(&token), Err(AuthError::IssuerMismatch));
    }

    #[test]
    fn audience_array_is_accepted() {
        let auth = authenticator(clock());
        let payload = serde_json::json!({
            "sub": "u1",
            "roles": ["USER"],
            "iss": auth.issuer(),
            "aud": ["billing", auth.audience()],
            "iat": NOW,
            "exp": NOW + 60,
        });
        let token = sign_raw(Algorithm::RS256, KID_A, &payload);

        let claims = auth.validate_token(&token).unwrap();
        assert_eq!(claims.audience, auth.audience());
        assert_eq!(claims.roles, vec![Role::User]);
    }

    #[test]
    fn unknown_role_fails_validation() {
        let auth = authenticator(clock());
        let payload = serde_json::json!({
            "sub": "u1",
            "roles": ["ADMIN", "SUPERUSER"],
            "iss": auth.issuer(),
            "aud": auth.audience(),
            "iat": NOW,
            "exp": NOW + 60,
        });
        let token = sign_raw(Algorithm::RS256, KID_A, &payload);

        assert_eq!(
            auth.validate_token(&token),
            Err(AuthError::InvalidRole("SUPERUSER".to_string()))
        );
    }

    #[test]
    fn unknown_kid_fails() {
        let auth = authenticator(clock());
        let other = Authenticator::new(
            &AuthConfig::default(),
            Arc::new(MemoryKeyStore::from_keys([(KID_B, pair_b())])),
        )
        .unwrap();
        let token = other.generate_token(KID_B, &admin_claims(&auth)).unwrap();

        assert_eq!(auth.validate_token(&token), Err(AuthError::UnknownKeyId));
    }

    #[test]
    fn missing_kid_is_malformed() {
        let auth = authenticator(clock());
        let claims = admin_claims(&auth);
        let key = EncodingKey::from_rsa_pem(crate::keystore::tests::PRIVATE_A).unwrap();
        let token = encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap();

        assert!(matches!(
            auth.validate_token(&token),
            Err(AuthError::MalformedToken(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let auth = authenticator(clock());
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert!(
                matches!(auth.validate_token(token), Err(AuthError::MalformedToken(_))),
                "{token:?} should be malformed"
            );
        }
    }

    #[test]
    fn algorithm_confusion_is_rejected() {
        // Classic downgrade: sign with HS256 using the public key as the secret.
        let auth = authenticator(clock());
        let claims = admin_claims(&auth);
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(KID_A.to_string());
        let token = encode(&header, &claims, &EncodingKey::from_secret(PUBLIC_A)).unwrap();

        assert_eq!(auth.validate_token(&token), Err(AuthError::AlgorithmMismatch));
    }

    #[test]
    fn other_asymmetric_algorithm_is_rejected() {
        // Same RSA key, different RSA algorithm than the pinned one.
        let auth = authenticator(clock());
        let mut header = Header::new(Algorithm::RS512);
        header.kid = Some(KID_A.to_string());
        let key = EncodingKey::from_rsa_pem(crate::keystore::tests::PRIVATE_A).unwrap();
        let token = encode(&header, &admin_claims(&auth), &key).unwrap();

        assert_eq!(auth.validate_token(&token), Err(AuthError::AlgorithmMismatch));
    }

    #[test]
    fn key_rotation_continuity() {
        let auth = authenticator(clock());
        auth.set_active_kid(KID_A).unwrap();
        let claims = admin_claims(&auth);
        let old_token = auth.issue(&claims).unwrap();

        assert_eq!(auth.add_key(KID_B, pair_b()), 2);
        auth.set_active_kid(KID_B).unwrap();
        let new_token = auth.issue(&claims).unwrap();
        assert_eq!(decode_header(&new_token).unwrap().kid.as_deref(), Some(KID_B));

        assert!(auth.validate_token(&old_token).is_ok());
        assert!(auth.validate_token(&new_token).is_ok());

        assert_eq!(auth.remove_key(KID_A), 1);
        assert_eq!(auth.validate_token(&old_token), Err(AuthError::UnknownKeyId));
        assert!(auth.validate_token(&new_token).is_ok());
        assert_eq!(auth.active_kid().as_deref(), Some(KID_B));
    }

    #[test]
    fn removing_active_key_clears_it() {
        let auth = authenticator(clock());
        auth.set_active_kid(KID_A).unwrap();
        auth.remove_key(KID_A);

        assert_eq!(auth.active_kid(), None);
        assert_eq!(auth.issue(&admin_claims(&auth)), Err(AuthError::NoActiveKey));
    }

    #[test]
    fn active_kid_never_names_a_removed_key() {
        let auth = authenticator(clock());

        for _ in 0..50 {
            std::thread::scope(|s| {
                s.spawn(|| {
                    auth.add_key(KID_B, pair_b());
                    let _ = auth.set_active_kid(KID_B);
                });
                s.spawn(|| {
                    auth.remove_key(KID_B);
                });
            });

            if let Some(kid) = auth.active_kid() {
                assert!(
                    auth.keys().lookup(&kid).is_some(),
                    "active kid {kid} has no key"
                );
            }
        }

        auth.remove_key(KID_B);
        assert_eq!(auth.active_kid(), None);
        assert_eq!(
            auth.issue(&admin_claims(&auth)),
            Err(AuthError::NoActiveKey)
        );
    }

    #[test]
    fn set_active_kid_requires_signing_material() {
        let auth = authenticator(clock());
        assert!(matches!(
            auth.set_active_kid("missing"),
            Err(AuthError::KeyNotFound(_))
        ));
        assert_eq!(auth.active_kid(), None);
    }

    #[test]
    fn claims_for_stamps_config_and_clock() {
        let auth = authenticator(clock());
        let claims = auth
            .claims_for("u1", vec![Role::User], Duration::from_secs(60))
            .unwrap();
        assert_eq!(claims.issuer, "service project");
        assert_eq!(claims.audience, "students");
        assert_eq!(claims.issued_at.timestamp(), NOW);
        assert_eq!(claims.expires_at.timestamp(), NOW + 60);

        let zero = auth.claims_for("u1", vec![Role::User], Duration::ZERO);
        assert!(matches!(zero, Err(AuthError::ClaimsInvalid(_))));
    }

    #[test]
    fn mock_validator_parses_roles() {
        let validator = MockTokenValidator::default();
        let claims = validator.validate("test-token:u1:ADMIN,USER").unwrap();
        assert_eq!(claims.subject, "u1");
        assert_eq!(claims.roles, vec![Role::Admin, Role::User]);

        let none = validator.validate("test-token:u2:").unwrap();
        assert!(none.roles.is_empty());
    }

    #[test]
    fn mock_validator_rejects_invalid() {
        let validator = MockTokenValidator::default();
        assert!(matches!(
            validator.validate("bogus"),
            Err(AuthError::MalformedToken(_))
        ));
        assert_eq!(
            validator.validate("test-token:u1:ROOT"),
            Err(AuthError::InvalidRole("ROOT".to_string()))
        );
    }

    fn sign_raw(algorithm: Algorithm, kid: &str, payload: &serde_json::Value) -> String {
        let mut header = Header::new(algorithm);
        header.kid = Some(kid.to_string());
        let key = EncodingKey::from_rsa_pem(crate::keystore::tests::PRIVATE_A).unwrap();
        encode(&header, payload, &key).unwrap()
    }
}
