use contracts::domain::a001_dream::{Dream, DreamCreationRequest};
use uuid::Uuid;

use super::generator;
use crate::shared::{error::AppError, state::AppState};

/// Создание нового Dream и запуск генерации
pub fn create(state: &AppState, owner: Uuid, request: DreamCreationRequest) -> Result<Dream, AppError> {
    // Валидация
    request.validate().map_err(AppError::BadRequest)?;

    let dream = Dream::new_pending(
        request.title.trim().to_string(),
        request.description.trim().to_string(),
        request.normalized_tags(),
        request.blockchain,
    );

    let generation = state.config.generation.clone();
    let fail = generation
        .fail_keyword
        .as_deref()
        .map(|kw| !kw.is_empty() && dream.description.contains(kw))
        .unwrap_or(false);

    state.dreams.insert(owner, dream.clone());
    tracing::info!(
        "Dream {} created (style='{}', mood='{}', chain={})",
        dream.id,
        request.style,
        request.mood,
        dream.blockchain.as_str()
    );

    generator::spawn_generation(state.dreams.clone(), generation, dream.id, fail);

    Ok(dream)
}
