use std::sync::Arc;

use contracts::system::auth::UserSession;

use crate::domain::a001_dream::DreamService;
use crate::shared::api_utils::ApiClient;
use crate::shared::config::ApiConfig;
use crate::shared::error::ApiError;
use crate::system::auth::context::AuthService;
use crate::system::auth::storage::TokenStore;

/// Application state: session gate plus dream collections over one shared client
pub struct AppState {
    pub auth: AuthService,
    pub dreams: DreamService,
}

impl AppState {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        let api = ApiClient::new(config, tokens)?;
        Ok(Self {
            auth: AuthService::new(api.clone()),
            dreams: DreamService::new(api),
        })
    }

    /// Восстановить сессию и, если удалось, загрузить сны
    pub async fn bootstrap(&mut self) -> Result<bool, ApiError> {
        if !self.auth.bootstrap().await {
            return Ok(false);
        }
        self.dreams.load_dreams().await?;
        Ok(true)
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<UserSession, ApiError> {
        let session = self.auth.login(email, password).await?.clone();
        self.dreams.load_dreams().await?;
        Ok(session)
    }

    pub async fn register(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<UserSession, ApiError> {
        let session = self.auth.register(username, email, password).await?.clone();
        self.dreams.load_dreams().await?;
        Ok(session)
    }

    pub async fn logout(&mut self) -> Result<(), ApiError> {
        self.dreams.clear();
        self.auth.logout().await
    }

    /// No-op when not authenticated
    pub async fn refresh_dreams(&mut self) -> Result<(), ApiError> {
        if !self.auth.is_authenticated() {
            return Ok(());
        }
        self.dreams.load_dreams().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::auth::storage::MemoryTokenStore;
    use crate::test_support::spawn_backend;

    #[tokio::test]
    async fn test_refresh_is_noop_when_logged_out() {
        // адрес недоступен: запрос дал бы ошибку
        let mut app = AppState::new(
            &ApiConfig::with_base_url("http://127.0.0.1:9"),
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        app.refresh_dreams().await.unwrap();
        assert!(!app.bootstrap().await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_empties_collections() {
        let base = spawn_backend().await;
        let mut app = AppState::new(
            &ApiConfig::with_base_url(&base),
            Arc::new(MemoryTokenStore::new()),
        )
        .unwrap();
        app.register("dreamer", "d@example.com", "secret-pass")
            .await
            .unwrap();

        let request = serde_json::from_value(serde_json::json!({
            "title": "Flying whale",
            "description": "A whale over the city",
            "style": "surreal",
            "mood": "calm"
        }))
        .unwrap();
        app.dreams.submit_dream(&request).await.unwrap();
        assert_eq!(app.dreams.store().pending().len(), 1);

        app.logout().await.unwrap();
        assert!(app.dreams.store().pending().is_empty());
        assert!(app.dreams.store().completed().is_empty());
        assert!(!app.auth.is_authenticated());
    }
}
