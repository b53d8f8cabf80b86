//! HTTP core shared by every API call.
//!
//! [`ApiClient`] attaches the bearer token from the credential store, maps HTTP
//! statuses onto [`ApiError`] and clears the stored token when the server answers 401.

use std::sync::Arc;
use std::time::Duration;

use contracts::shared::error::ErrorBody;
use reqwest::header::ACCEPT;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use super::config::ApiConfig;
use super::error::ApiError;
use crate::system::auth::storage::TokenStore;

/// Attach the stored credential to the request or not
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    Bearer,
    Anonymous,
}

/// HTTP client for the DreamEcho API.
///
/// Cheap to clone: clones share the connection pool and the credential store.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    events_url: String,
    request_timeout: Duration,
    tokens: Arc<dyn TokenStore>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig, tokens: Arc<dyn TokenStore>) -> Result<Self, ApiError> {
        // Общий таймаут не задаём на уровне клиента: он оборвал бы поток событий
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            events_url: config.events_base().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.timeout_secs),
            tokens,
        })
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub fn has_token(&self) -> bool {
        matches!(self.tokens.load(), Ok(Some(_)))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn events_url(&self, path: &str) -> String {
        format!("{}{}", self.events_url, path)
    }

    /// GET JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.http.get(self.url(path)).timeout(self.request_timeout);
        let response = self.send(builder, Auth::Bearer).await?;
        decode_json(response).await
    }

    /// POST JSON body, expect JSON back
    pub async fn post_json<B, T>(&self, path: &str, body: &B, auth: Auth) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self
            .http
            .post(self.url(path))
            .timeout(self.request_timeout)
            .json(body);
        let response = self.send(builder, auth).await?;
        decode_json(response).await
    }

    /// POST without body, response body is ignored
    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let builder = self.http.post(self.url(path)).timeout(self.request_timeout);
        self.send(builder, Auth::Bearer).await?;
        Ok(())
    }

    /// Open a long-lived `text/event-stream` response on the events host.
    ///
    /// No request timeout is applied; the caller owns the body and its lifetime.
    pub async fn open_event_stream(&self, path: &str) -> Result<Response, ApiError> {
        let builder = self
            .http
            .get(self.events_url(path))
            .header(ACCEPT, "text/event-stream");
        self.send(builder, Auth::Bearer).await
    }

    async fn send(&self, builder: RequestBuilder, auth: Auth) -> Result<Response, ApiError> {
        let token = match auth {
            Auth::Bearer => self.tokens.load()?,
            Auth::Anonymous => None,
        };
        let builder = match &token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        let response = builder.send().await?;
        tracing::debug!("{} {}", response.status().as_u16(), response.url().path());
        self.check_status(response, token.as_deref()).await
    }

    async fn check_status(
        &self,
        response: Response,
        sent_token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            if let Some(sent) = sent_token {
                self.clear_rejected_token(sent)?;
            }
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(status, &body);
        tracing::warn!("API request failed with status {}: {}", status, message);

        Err(match status {
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::BAD_REQUEST => ApiError::BadRequest(message),
            other => ApiError::ServerError(other.as_u16(), message),
        })
    }

    /// Очистить токен, только если в хранилище всё ещё тот, что отклонён сервером.
    /// Сравнение и удаление атомарны: параллельные 401 по одному токену очищают его один раз.
    fn clear_rejected_token(&self, sent: &str) -> Result<(), ApiError> {
        if self.tokens.clear_if(sent)? {
            tracing::warn!("Server rejected the stored token (401), credential cleared");
        }
        Ok(())
    }
}

/// Разобрать JSON ответа; ошибка разбора = InvalidResponse
async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| {
        let preview: String = String::from_utf8_lossy(&bytes).chars().take(200).collect();
        tracing::error!("Failed to parse API response: {}. Body: {}", e, preview);
        ApiError::InvalidResponse(e.to_string())
    })
}

/// Текст ошибки из `{"message": ...}`, иначе сырое тело, иначе текст статуса
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.message;
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::auth::storage::{MemoryTokenStore, TokenStoreError};
    use crate::test_support::spawn_router;
    use axum::{
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::get,
        Json, Router,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory store that counts `clear` calls
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryTokenStore,
        clears: AtomicUsize,
    }

    impl TokenStore for CountingStore {
        fn save(&self, token: &str) -> Result<(), TokenStoreError> {
            self.inner.save(token)
        }
        fn load(&self) -> Result<Option<String>, TokenStoreError> {
            self.inner.load()
        }
        fn clear(&self) -> Result<(), TokenStoreError> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear()
        }
        fn clear_if(&self, token: &str) -> Result<bool, TokenStoreError> {
            let cleared = self.inner.clear_if(token)?;
            if cleared {
                self.clears.fetch_add(1, Ordering::SeqCst);
            }
            Ok(cleared)
        }
    }

    fn client(base_url: &str, store: Arc<dyn TokenStore>) -> ApiClient {
        ApiClient::new(&ApiConfig::with_base_url(base_url), store).unwrap()
    }

    /// Router that records the Authorization header of every call and answers 401
    fn rejecting_router(seen: Arc<Mutex<Vec<Option<String>>>>) -> Router {
        Router::new().route(
            "/api/dreams",
            get(move |headers: HeaderMap| {
                let seen = seen.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().push(auth);
                    (AxumStatus::UNAUTHORIZED, Json(ErrorBody::new("token expired")))
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_401_clears_token_once_and_later_calls_are_anonymous() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_router(rejecting_router(seen.clone())).await;
        let store = Arc::new(CountingStore::default());
        store.save("stale-token").unwrap();
        let api = client(&base, store.clone());

        let first = api.get_json::<serde_json::Value>("/api/dreams").await;
        assert!(matches!(first, Err(ApiError::Unauthorized)));
        assert_eq!(store.load().unwrap(), None);

        let second = api.get_json::<serde_json::Value>("/api/dreams").await;
        assert!(matches!(second, Err(ApiError::Unauthorized)));

        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        let seen = seen.lock();
        assert_eq!(seen[0].as_deref(), Some("Bearer stale-token"));
        assert_eq!(seen[1], None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_401s_clear_token_once() {
        // оба запроса доходят до сервера, прежде чем любой получит ответ
        let gate = Arc::new(tokio::sync::Barrier::new(2));
        let router = Router::new().route(
            "/api/dreams",
            get(move || {
                let gate = gate.clone();
                async move {
                    gate.wait().await;
                    (AxumStatus::UNAUTHORIZED, Json(ErrorBody::new("token revoked")))
                }
            }),
        );
        let base = spawn_router(router).await;
        let store = Arc::new(CountingStore::default());
        store.save("shared-token").unwrap();
        let api = client(&base, store.clone());

        let first = api.clone();
        let second = api.clone();
        let (a, b) = tokio::join!(
            tokio::spawn(async move { first.get_json::<serde_json::Value>("/api/dreams").await }),
            tokio::spawn(async move { second.get_json::<serde_json::Value>("/api/dreams").await }),
        );

        assert!(matches!(a.unwrap(), Err(ApiError::Unauthorized)));
        assert!(matches!(b.unwrap(), Err(ApiError::Unauthorized)));
        assert_eq!(store.clears.load(Ordering::SeqCst), 1);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_401_does_not_clear_a_newer_token() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let base = spawn_router(rejecting_router(seen)).await;
        let store = Arc::new(CountingStore::default());
        let api = client(&base, store.clone());

        // запрос ушёл без токена, а пользователь тем временем залогинился
        let builder = api.http.get(api.url("/api/dreams"));
        let response = builder.send().await.unwrap();
        store.save("fresh-token").unwrap();
        let result = api.check_status(response, Some("old-token")).await;

        assert!(matches!(result, Err(ApiError::Unauthorized)));
        assert_eq!(store.load().unwrap().as_deref(), Some("fresh-token"));
        assert_eq!(store.clears.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let router = Router::new()
            .route(
                "/bad",
                get(|| async { (AxumStatus::BAD_REQUEST, Json(ErrorBody::new("title is empty"))) }),
            )
            .route("/missing", get(|| async { AxumStatus::NOT_FOUND }))
            .route(
                "/boom",
                get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "maintenance") }),
            )
            .route("/garbage", get(|| async { "not json" }));
        let base = spawn_router(router).await;
        let api = client(&base, Arc::new(MemoryTokenStore::new()));

        match api.get_json::<serde_json::Value>("/bad").await {
            Err(ApiError::BadRequest(message)) => assert_eq!(message, "title is empty"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            api.get_json::<serde_json::Value>("/missing").await,
            Err(ApiError::NotFound)
        ));
        match api.get_json::<serde_json::Value>("/boom").await {
            Err(ApiError::ServerError(code, message)) => {
                assert_eq!(code, 503);
                assert_eq!(message, "maintenance");
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(matches!(
            api.get_json::<serde_json::Value>("/garbage").await,
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        // порт освобождён сразу после bind
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let api = client(&format!("http://{}", addr), Arc::new(MemoryTokenStore::new()));
        let result = api.get_json::<serde_json::Value>("/api/dreams").await;
        assert!(matches!(result, Err(ApiError::Network(_))));
    }

    #[test]
    fn test_error_message_fallbacks() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message":"nope"}"#),
            "nope"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, " upstream "), "upstream");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
    }

    #[test]
    fn test_urls_trim_trailing_slash() {
        let config = ApiConfig {
            events_url: Some("http://events:4000/".into()),
            ..ApiConfig::with_base_url("http://api:3000/")
        };
        let api = ApiClient::new(&config, Arc::new(MemoryTokenStore::new())).unwrap();
        assert_eq!(api.url("/api/dreams"), "http://api:3000/api/dreams");
        assert_eq!(api.events_url("/api/dreams/1/events"), "http://events:4000/api/dreams/1/events");
    }
}
