use contracts::system::auth::{UserInfo, UserSession};

use super::api;
use crate::shared::api_utils::ApiClient;
use crate::shared::error::ApiError;

/// Session gate.
///
/// Holds the in-memory session; the bearer token itself lives in the
/// [`TokenStore`](super::storage::TokenStore) shared with every [`ApiClient`] clone.
/// A 401 on any call clears the stored token, after which the gate reports
/// itself unauthenticated even if `session` is still filled.
pub struct AuthService {
    api: ApiClient,
    session: Option<UserSession>,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        Self { api, session: None }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Restore session from the stored token.
    ///
    /// Returns `true` when the server accepted the token. Any failure leaves the gate unauthenticated.
    pub async fn bootstrap(&mut self) -> bool {
        if !self.api.has_token() {
            return false;
        }
        match api::fetch_current_session(&self.api).await {
            Ok(session) => {
                tracing::info!("Session restored for {}", session.user.username);
                self.session = Some(session);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to restore session: {}", e);
                self.session = None;
                false
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&UserSession, ApiError> {
        let session = api::login(&self.api, email, password).await?;
        self.establish(session)
    }

    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<&UserSession, ApiError> {
        let session = api::register(&self.api, username, email, password).await?;
        self.establish(session)
    }

    /// Перечитать сессию с сервера
    pub async fn refresh_session(&mut self) -> Result<&UserSession, ApiError> {
        match api::fetch_current_session(&self.api).await {
            Ok(session) => Ok(&*self.session.insert(session)),
            Err(e) => {
                if e.is_unauthorized() {
                    self.session = None;
                }
                Err(e)
            }
        }
    }

    /// Logout: server call is best-effort, local state is always cleared
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        if self.api.has_token() {
            if let Err(e) = api::logout(&self.api).await {
                tracing::warn!("Server logout failed: {}", e);
            }
        }
        self.invalidate()
    }

    /// Drop the session and the stored token without contacting the server
    pub fn invalidate(&mut self) -> Result<(), ApiError> {
        self.session = None;
        self.api.token_store().clear()?;
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some() && self.api.has_token()
    }

    pub fn session(&self) -> Option<&UserSession> {
        self.session.as_ref().filter(|_| self.api.has_token())
    }

    pub fn user(&self) -> Option<&UserInfo> {
        self.session().map(|s| &s.user)
    }

    fn establish(&mut self, session: UserSession) -> Result<&UserSession, ApiError> {
        self.api.token_store().save(&session.token)?;
        tracing::info!("Logged in as {}", session.user.username);
        Ok(&*self.session.insert(session))
    }
}
