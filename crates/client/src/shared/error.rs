use thiserror::Error;

use crate::system::auth::storage::TokenStoreError;

/// Ошибки клиента DreamEcho API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Ответ не HTTP или тело не разбирается
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// 401; сохранённый токен уже очищен
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    BadRequest(String),

    #[error("Server error {0}: {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Credential store error: {0}")]
    Storage(#[from] TokenStoreError),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}
