use axum::{extract::State, http::StatusCode, Json};
use contracts::system::auth::{LoginRequest, RegisterRequest, UserInfo, UserSession};
use uuid::Uuid;

use crate::shared::{error::AppError, state::AppState};
use crate::system::auth::{extractor::CurrentUser, jwt};
use crate::system::users::service as user_service;

/// POST /api/auth/login
///
/// Wrong credentials answer 400, not 401.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserSession>, AppError> {
    let user = user_service::verify_credentials(&state.users, &request.email, &request.password)?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".into()))?;

    tracing::info!("User {} logged in", user.email);
    Ok(Json(issue_session(&state, user)?))
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<UserSession>, AppError> {
    let user = user_service::register(&state.users, request)?;
    Ok(Json(issue_session(&state, user)?))
}

/// GET /api/session (protected by middleware)
pub async fn current_session(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<UserSession>, AppError> {
    let user_id = Uuid::parse_str(&current.claims.sub).map_err(|_| AppError::Unauthorized)?;
    let user = state
        .users
        .get_by_id(user_id)
        .ok_or(AppError::Unauthorized)?;

    Ok(Json(UserSession {
        user: user.info,
        token: current.token,
    }))
}

/// POST /api/auth/logout (protected by middleware)
pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> StatusCode {
    state.users.revoke(&current.claims.jti, current.claims.exp as i64);
    tracing::info!("User {} logged out", current.claims.username);
    StatusCode::OK
}

fn issue_session(state: &AppState, user: UserInfo) -> Result<UserSession, AppError> {
    let token = jwt::generate_access_token(
        &state.jwt_secret,
        state.config.auth.token_lifetime_hours,
        &user.id.to_string(),
        &user.username,
    )?;
    Ok(UserSession { user, token })
}
