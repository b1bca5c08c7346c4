use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use service_core::error::AppError;

use crate::services::{AccessTokenClaims, Role};
use crate::startup::AppState;

/// Any authenticated user or admin.
pub async fn require_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::User, Role::Admin]).await
}

/// Admins only.
pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Admin]).await
}

async fn authorize(
    state: &AppState,
    mut req: Request,
    next: Next,
    allowed: &[Role],
) -> Result<Response, AppError> {
    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = state.jwt.verify(bearer.token()).map_err(|e| {
        tracing::warn!(error = %e, "Rejected access token");
        e
    })?;

    // Insufficient role is reported as 401, same as a missing token.
    if !allowed.contains(&claims.role) {
        tracing::warn!(user_id = %claims.sub, role = ?claims.role, "Role not permitted for route");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Unauthorized: insufficient role"
        )));
    }

    tracing::Span::current().record("user_id", claims.sub.as_str());
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Claims of the caller, available on routes behind `require_user`/`require_admin`.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AccessTokenClaims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccessTokenClaims>()
            .cloned()
            .map(AuthUser)
            .ok_or_else(|| {
                AppError::Unauthorized(anyhow::anyhow!("Auth claims missing from request"))
            })
    }
}
