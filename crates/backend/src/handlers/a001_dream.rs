use std::convert::Infallible;

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use contracts::domain::a001_dream::{Dream, DreamCreationRequest, DreamId, DreamProgressEvent};
use contracts::domain::common::AggregateId;
use futures_util::stream;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::a001_dream::service;
use crate::shared::{error::AppError, state::AppState};
use crate::system::auth::extractor::CurrentUser;

/// GET /api/dreams
pub async fn list_all(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Dream>>, AppError> {
    let owner = owner_id(&current)?;
    Ok(Json(state.dreams.list_by_owner(owner)))
}

/// POST /api/dreams
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(request): Json<DreamCreationRequest>,
) -> Result<Json<Dream>, AppError> {
    let owner = owner_id(&current)?;
    let dream = service::create(&state, owner, request)?;
    Ok(Json(dream))
}

/// GET /api/dreams/:id
pub async fn get_by_id(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Dream>, AppError> {
    let owner = owner_id(&current)?;
    let id = parse_id(&id)?;
    state
        .dreams
        .get(owner, id)
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// GET /api/dreams/:id/events
///
/// Одна JSON-строка `DreamProgressEvent` на событие. Сначала текущее состояние,
/// затем каждое изменение; поток закрывается после терминального события.
pub async fn events(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let owner = owner_id(&current)?;
    let id = parse_id(&id)?;
    let rx = state.dreams.subscribe(owner, id).ok_or(AppError::NotFound)?;

    tracing::info!("Progress stream opened for dream {}", id);

    let body = Body::from_stream(progress_lines(rx));
    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}

fn progress_lines(
    rx: watch::Receiver<DreamProgressEvent>,
) -> impl futures_util::Stream<Item = Result<String, Infallible>> {
    // (receiver, первое событие, поток завершён)
    stream::unfold((rx, true, false), |(mut rx, first, done)| async move {
        if done {
            return None;
        }
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let event = rx.borrow_and_update().clone();
        let terminal = event.status.is_terminal();
        let mut line = serde_json::to_string(&event).ok()?;
        line.push('\n');
        Some((Ok(line), (rx, false, terminal)))
    })
}

fn owner_id(current: &CurrentUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&current.claims.sub).map_err(|_| AppError::Unauthorized)
}

fn parse_id(id: &str) -> Result<DreamId, AppError> {
    DreamId::from_string(id).map_err(AppError::BadRequest)
}
