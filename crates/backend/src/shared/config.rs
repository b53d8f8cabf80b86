use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Секрет для подписи JWT; если не задан, генерируется при старте
    #[serde(default)]
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            token_lifetime_hours: default_token_lifetime_hours(),
        }
    }
}

/// Параметры имитации генерации модели
#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_step_interval_ms")]
    pub step_interval_ms: u64,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Dreams whose description contains this keyword fail halfway through
    #[serde(default)]
    pub fail_keyword: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            step_interval_ms: default_step_interval_ms(),
            steps: default_steps(),
            fail_keyword: None,
        }
    }
}

fn default_token_lifetime_hours() -> i64 {
    24
}

fn default_step_interval_ms() -> u64 {
    1500
}

fn default_steps() -> u32 {
    4
}

/// Default configuration embedded in the binary
const DEFAULT_CONFIG: &str = r#"
[server]
host = "0.0.0.0"
port = 3000

[auth]
token_lifetime_hours = 24

[generation]
step_interval_ms = 1500
steps = 4
"#;

/// Load configuration from config.toml file
///
/// Search order:
/// 1. Next to the executable (for production)
/// 2. Falls back to embedded default config
pub fn load_config() -> anyhow::Result<Config> {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let config_path = exe_dir.join("config.toml");

            if config_path.exists() {
                tracing::info!("Loading config from: {}", config_path.display());
                return load_config_from(&config_path);
            } else {
                tracing::warn!("config.toml not found at: {}", config_path.display());
            }
        }
    }

    tracing::info!("Using default embedded configuration");
    default_config()
}

pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

pub fn default_config() -> anyhow::Result<Config> {
    let config: Config = toml::from_str(DEFAULT_CONFIG)?;
    Ok(config)
}
