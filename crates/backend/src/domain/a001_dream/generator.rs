use std::time::Duration;

use contracts::domain::a001_dream::{DreamId, DreamProgressEvent, DreamStatus};

use super::repository::DreamRepository;
use crate::shared::config::GenerationConfig;

/// Имитация генерации 3D-модели.
///
/// Каждые `step_interval_ms` публикует шаг processing, последний шаг переводит
/// Dream в completed и проставляет ссылки на модель. Если `fail` выставлен,
/// генерация обрывается на середине со статусом failed.
pub fn spawn_generation(repo: DreamRepository, config: GenerationConfig, id: DreamId, fail: bool) {
    tokio::spawn(async move {
        run_generation(repo, config, id, fail).await;
    });
}

async fn run_generation(repo: DreamRepository, config: GenerationConfig, id: DreamId, fail: bool) {
    let steps = config.steps.max(1);
    let interval = Duration::from_millis(config.step_interval_ms);
    let fail_at = (steps / 2).max(1);

    tracing::info!("Generation started for dream {} ({} steps)", id, steps);

    for step in 1..=steps {
        tokio::time::sleep(interval).await;
        let progress = step as f64 / steps as f64;

        if fail && step >= fail_at {
            let event = DreamProgressEvent::new(DreamStatus::Failed, progress)
                .with_message("Model generation failed");
            repo.record_progress(id, event, |_| {});
            tracing::warn!("Generation failed for dream {}", id);
            return;
        }

        if step == steps {
            let event = DreamProgressEvent::new(DreamStatus::Completed, 1.0)
                .with_message("Model is ready");
            repo.record_progress(id, event, |dream| {
                dream.preview_image_url = Some(format!("/static/previews/{}.png", id));
                dream.usd_model_url = Some(format!("/static/models/{}.usdz", id));
            });
            tracing::info!("Generation completed for dream {}", id);
            return;
        }

        let event = DreamProgressEvent::new(DreamStatus::Processing, progress)
            .with_message(format!("Step {}/{}", step, steps));
        if !repo.record_progress(id, event, |_| {}) {
            tracing::warn!("Generation aborted for dream {}: record rejected", id);
            return;
        }
    }
}
