use contracts::domain::a001_dream::{Dream, DreamCreationRequest, DreamId};
use tokio_util::sync::CancellationToken;

use super::events::ProgressStream;
use crate::shared::api_utils::{ApiClient, Auth};
use crate::shared::error::ApiError;

pub async fn fetch_dreams(api: &ApiClient) -> Result<Vec<Dream>, ApiError> {
    api.get_json("/api/dreams").await
}

pub async fn submit_dream(api: &ApiClient, request: &DreamCreationRequest) -> Result<Dream, ApiError> {
    api.post_json("/api/dreams", request, Auth::Bearer).await
}

pub async fn fetch_dream(api: &ApiClient, id: DreamId) -> Result<Dream, ApiError> {
    api.get_json(&format!("/api/dreams/{}", id)).await
}

/// Открыть поток прогресса. Ошибочный статус ответа возвращается до первого события.
pub async fn open_progress_stream(
    api: &ApiClient,
    id: DreamId,
    cancel: CancellationToken,
) -> Result<ProgressStream, ApiError> {
    let response = api
        .open_event_stream(&format!("/api/dreams/{}/events", id))
        .await?;
    tracing::debug!("Progress stream opened for dream {}", id);
    Ok(ProgressStream::from_response(response, cancel))
}
