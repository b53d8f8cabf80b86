use crate::domain::common::AggregateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// ID типа для агрегата Dream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DreamId(pub Uuid);

impl DreamId {
    pub fn new(value: Uuid) -> Self {
        Self(value)
    }
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl AggregateId for DreamId {
    fn as_string(&self) -> String {
        self.0.to_string()
    }
    fn from_string(s: &str) -> Result<Self, String> {
        Uuid::parse_str(s)
            .map(DreamId::new)
            .map_err(|e| format!("Invalid UUID: {}", e))
    }
}

impl std::fmt::Display for DreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Статус генерации модели
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DreamStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl DreamStatus {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(DreamStatus::Pending),
            "processing" => Ok(DreamStatus::Processing),
            "completed" => Ok(DreamStatus::Completed),
            "failed" => Ok(DreamStatus::Failed),
            _ => Err(format!("Unknown dream status: {}", s)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DreamStatus::Pending => "pending",
            DreamStatus::Processing => "processing",
            DreamStatus::Completed => "completed",
            DreamStatus::Failed => "failed",
        }
    }

    /// Генерация ещё не завершена (в очереди или в работе)
    pub fn is_pending(&self) -> bool {
        matches!(self, DreamStatus::Pending | DreamStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Допустим ли переход из текущего статуса в `next`.
    ///
    /// Статус движется только вперёд: pending → processing → {completed, failed}.
    /// Повтор того же статуса допустим (несколько событий processing подряд).
    pub fn can_transition_to(&self, next: DreamStatus) -> bool {
        use DreamStatus::*;
        match (self, next) {
            (a, b) if *a == b => true,
            (Pending, Processing) => true,
            (Pending | Processing, Completed | Failed) => true,
            _ => false,
        }
    }

    /// Короткая подпись статуса для UI
    pub fn progress_message(&self) -> &'static str {
        match self {
            DreamStatus::Pending => "Waiting in queue",
            DreamStatus::Processing => "Generating model",
            DreamStatus::Completed => "Generation complete",
            DreamStatus::Failed => "Generation failed",
        }
    }
}

impl std::fmt::Display for DreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Блокчейн для будущего NFT (непрозрачный тег, минтинг вне клиента)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BlockchainOption {
    #[default]
    Ethereum,
    Polygon,
    Bsc,
    Avalanche,
}

impl BlockchainOption {
    pub const ALL: [BlockchainOption; 4] = [
        BlockchainOption::Ethereum,
        BlockchainOption::Polygon,
        BlockchainOption::Bsc,
        BlockchainOption::Avalanche,
    ];

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "ethereum" => Ok(BlockchainOption::Ethereum),
            "polygon" => Ok(BlockchainOption::Polygon),
            "bsc" => Ok(BlockchainOption::Bsc),
            "avalanche" => Ok(BlockchainOption::Avalanche),
            _ => Err(format!("Unknown blockchain: {}", s)),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BlockchainOption::Ethereum => "ethereum",
            BlockchainOption::Polygon => "polygon",
            BlockchainOption::Bsc => "bsc",
            BlockchainOption::Avalanche => "avalanche",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BlockchainOption::Ethereum => "Ethereum",
            BlockchainOption::Polygon => "Polygon",
            BlockchainOption::Bsc => "BNB Chain",
            BlockchainOption::Avalanche => "Avalanche",
        }
    }
}

/// Агрегат Dream: описание сна, отслеживаемое от отправки до готовой 3D-модели
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dream {
    pub id: DreamId,
    pub title: String,
    pub description: String,
    pub status: DreamStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Результаты генерации
    #[serde(rename = "previewImageURL", default)]
    pub preview_image_url: Option<String>,
    #[serde(rename = "usdModelURL", default)]
    pub usd_model_url: Option<String>,

    // NFT
    #[serde(default)]
    pub blockchain: BlockchainOption,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub royalty: Option<f64>,
}

impl Dream {
    /// Создать новый Dream в статусе pending
    pub fn new_pending(
        title: String,
        description: String,
        tags: Vec<String>,
        blockchain: BlockchainOption,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: DreamId::new_v4(),
            title,
            description,
            status: DreamStatus::Pending,
            tags,
            created_at: now,
            updated_at: now,
            preview_image_url: None,
            usd_model_url: None,
            blockchain,
            price: None,
            royalty: None,
        }
    }

    /// Применить новый статус. Обратные переходы отклоняются.
    pub fn apply_status(&mut self, next: DreamStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "Invalid status transition for dream {}: {} -> {}",
                self.id, self.status, next
            ));
        }
        if self.status != next {
            self.status = next;
            self.updated_at = Utc::now();
        }
        Ok(())
    }
}
