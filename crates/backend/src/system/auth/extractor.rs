use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use contracts::system::auth::TokenClaims;

/// Authenticated caller, put into request extensions by `require_auth`
/// Usage in handlers: `async fn handler(user: CurrentUser) -> Response`
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: TokenClaims,
    /// Raw bearer token as presented by the client
    pub token: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
