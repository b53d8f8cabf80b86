use contracts::system::auth::{LoginRequest, RegisterRequest, UserSession};

use crate::shared::api_utils::{ApiClient, Auth};
use crate::shared::error::ApiError;

/// Login with email and password
pub async fn login(api: &ApiClient, email: &str, password: &str) -> Result<UserSession, ApiError> {
    let request = LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    };
    api.post_json("/api/auth/login", &request, Auth::Anonymous)
        .await
}

/// Create account; the server answers with a ready session
pub async fn register(
    api: &ApiClient,
    username: &str,
    email: &str,
    password: &str,
) -> Result<UserSession, ApiError> {
    let request = RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    };
    api.post_json("/api/auth/register", &request, Auth::Anonymous)
        .await
}

/// Current session for the stored token
pub async fn fetch_current_session(api: &ApiClient) -> Result<UserSession, ApiError> {
    api.get_json("/api/session").await
}

/// Logout (revoke token on the server)
pub async fn logout(api: &ApiClient) -> Result<(), ApiError> {
    api.post_empty("/api/auth/logout").await
}
