//! Authentication and authorization middleware.
//!
//! [`authenticate`] turns the `Authorization: Bearer <token>` header into an
//! [`Authenticated`] request extension. [`authorize`] checks that extension
//! against a fixed [`RequiredRoles`] set. Only [`authenticate`] can build an
//! `Authenticated`, so a route whose authorization passed has necessarily
//! been authenticated first.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use sales_auth::{Claims, TokenValidator};
use sales_core::Role;

use crate::error::ApiError;
use crate::state::GatewayState;

/// Claims of a request that passed [`authenticate`].
#[derive(Debug, Clone)]
pub struct Authenticated {
    claims: Claims,
}

impl Authenticated {
    /// The validated claims.
    #[must_use]
    pub const fn claims(&self) -> &Claims {
        &self.claims
    }
}

/// Roles a route accepts; any one of them is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredRoles(pub Vec<Role>);

impl RequiredRoles {
    /// Roles accepted by the route.
    #[must_use]
    pub fn roles(&self) -> &[Role] {
        &self.0
    }
}

impl From<Vec<Role>> for RequiredRoles {
    fn from(roles: Vec<Role>) -> Self {
        Self(roles)
    }
}

/// Extract the token from a `Bearer <token>` authorization header.
///
/// The scheme is matched case-insensitively and the value must be exactly
/// two space-separated parts.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MalformedHeader)?;

    let parts: Vec<&str> = value.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(*token)
        }
        _ => Err(ApiError::MalformedHeader),
    }
}

/// Validate the bearer token and attach its claims to the request.
///
/// Errors returned by the downstream chain pass through unchanged.
pub async fn authenticate<V>(
    State(state): State<Arc<GatewayState<V>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    V: TokenValidator + 'static,
{
    let token = bearer_token(req.headers())?;
    let claims = state.validator.validate(token)?;

    tracing::debug!(subject = %claims.subject, roles = ?claims.roles, "Authenticated");
    req.extensions_mut().insert(Authenticated { claims });

    Ok(next.run(req).await)
}

/// Let the request through only if its claims hold a required role.
pub async fn authorize(
    State(required): State<RequiredRoles>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = req
        .extensions()
        .get::<Authenticated>()
        .ok_or(ApiError::ContextMissing("claims missing from context"))?;

    if !auth.claims.authorized(required.roles()) {
        return Err(ApiError::Forbidden {
            held: auth.claims.roles.clone(),
            required: required.0,
        });
    }

    Ok(next.run(req).await)
}

/// An authenticated user, extracted in handlers behind [`authenticate`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The token subject.
    pub subject: String,
    /// Roles carried by the token.
    pub roles: Vec<Role>,
    /// Full validated claims.
    pub claims: Claims,
}

impl AuthUser {
    /// Create an `AuthUser` from validated claims.
    #[must_use]
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            subject: claims.subject.clone(),
            roles: claims.roles.clone(),
            claims: claims.clone(),
        }
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Authenticated>()
            .map(|auth| Self::from_claims(auth.claims()))
            .ok_or(ApiError::ContextMissing("claims missing from context"))
    }
}
