use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contracts::shared::error::ErrorBody;
use thiserror::Error;

/// Ошибки HTTP API; тело ответа всегда `{"message": "..."}`
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(e) = &self {
            tracing::error!("Internal error: {:#}", e);
        }
        let message = match &self {
            // Подробности внутренних ошибок клиенту не отдаём
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        (self.status(), Json(ErrorBody::new(message))).into_response()
    }
}
