//! Caller identity endpoint.

use axum::Json;

use sales_auth::Claims;

use crate::mid::AuthUser;

/// Return the validated claims of the caller.
///
/// ```text
/// GET /v1/claims
/// Authorization: Bearer <token>
///
/// Response: 200 OK
/// {"sub": "u1", "roles": ["ADMIN"], "iss": "service project", "aud": "students", "iat": ..., "exp": ...}
/// ```
pub async fn claims(user: AuthUser) -> Json<Claims> {
    Json(user.claims)
}
