use super::aggregate::DreamStatus;
use serde::{Deserialize, Serialize};

/// Событие прогресса генерации (одна строка в потоке /api/dreams/{id}/events)
///
/// `progress` по соглашению не убывает, но сервер этого не гарантирует.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DreamProgressEvent {
    pub status: DreamStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DreamProgressEvent {
    pub fn new(status: DreamStatus, progress: f64) -> Self {
        Self {
            status,
            progress,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Прогресс, ограниченный диапазоном [0, 1]; NaN считается нулём
    pub fn clamped_progress(&self) -> f64 {
        if self.progress.is_nan() {
            0.0
        } else {
            self.progress.clamp(0.0, 1.0)
        }
    }

    /// Текст для отображения: сообщение сервера или подпись статуса
    pub fn display_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.status.progress_message())
    }
}
