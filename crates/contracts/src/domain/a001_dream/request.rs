use super::aggregate::BlockchainOption;
use serde::{Deserialize, Serialize};

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 4000;

/// Запрос на создание Dream (POST /api/dreams)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DreamCreationRequest {
    pub title: String,
    pub description: String,
    pub style: String,
    pub mood: String,
    #[serde(default)]
    pub blockchain: BlockchainOption,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DreamCreationRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Title must not be empty".into());
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(format!("Title must be at most {} characters", MAX_TITLE_CHARS));
        }
        if self.description.trim().is_empty() {
            return Err("Description must not be empty".into());
        }
        if self.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(format!(
                "Description must be at most {} characters",
                MAX_DESCRIPTION_CHARS
            ));
        }
        if self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err("Tags must not be empty".into());
        }
        Ok(())
    }

    /// Нормализованные теги: обрезаны пробелы, порядок сохранён
    pub fn normalized_tags(&self) -> Vec<String> {
        self.tags.iter().map(|t| t.trim().to_string()).collect()
    }
}
