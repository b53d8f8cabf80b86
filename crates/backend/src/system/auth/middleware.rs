use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::extractor::CurrentUser;
use crate::shared::{error::AppError, state::AppState};

/// Middleware that requires valid, non-revoked JWT authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    // Extract Authorization header
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    // Check Bearer prefix
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let claims = super::jwt::validate_token(&state.jwt_secret, &token).map_err(|e| {
        tracing::debug!("Rejected bearer token: {:#}", e);
        AppError::Unauthorized
    })?;

    if state.users.is_revoked(&claims.jti) {
        return Err(AppError::Unauthorized);
    }

    req.extensions_mut().insert(CurrentUser { claims, token });

    Ok(next.run(req).await)
}
