use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "dreamecho.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Отдельный адрес для потока событий; по умолчанию `base_url`
    #[serde(default)]
    pub events_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            events_url: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn events_base(&self) -> &str {
        self.events_url.as_deref().unwrap_or(&self.base_url)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub token_path: Option<PathBuf>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl ClientConfig {
    /// Путь к файлу токена: из конфига или `~/.dreamecho/token`
    pub fn token_path(&self) -> PathBuf {
        if let Some(path) = &self.storage.token_path {
            return path.clone();
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        home.join(".dreamecho").join("token")
    }

    /// Переопределения из окружения: API_BASE_URL, API_EVENTS_URL
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup("API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.api.base_url = base;
        }
        if let Some(events) = lookup("API_EVENTS_URL").filter(|v| !v.trim().is_empty()) {
            self.api.events_url = Some(events);
        }
    }
}

/// Load client configuration
///
/// Search order:
/// 1. Explicit path (must exist)
/// 2. `dreamecho.toml` in the current directory
/// 3. Built-in defaults
///
/// Environment overrides are applied last.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    let mut config = match path {
        Some(path) => {
            tracing::info!("Loading config from: {}", path.display());
            parse_file(path)?
        }
        None => {
            let local = Path::new(CONFIG_FILE_NAME);
            if local.exists() {
                tracing::info!("Loading config from: {}", local.display());
                parse_file(local)?
            } else {
                tracing::debug!("{} not found, using defaults", CONFIG_FILE_NAME);
                ClientConfig::default()
            }
        }
    };

    config.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

fn parse_file(path: &Path) -> anyhow::Result<ClientConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let config: ClientConfig = toml::from_str(&contents)?;
    Ok(config)
}
