use std::sync::Arc;

use crate::domain::a001_dream::repository::DreamRepository;
use crate::shared::config::Config;
use crate::system::auth::jwt;
use crate::system::users::repository::UserRepository;

/// Общее состояние приложения (передаётся в хендлеры через `State`)
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt_secret: Arc<String>,
    pub users: UserRepository,
    pub dreams: DreamRepository,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let jwt_secret = config
            .auth
            .jwt_secret
            .clone()
            .unwrap_or_else(jwt::generate_jwt_secret);

        Self {
            config: Arc::new(config),
            jwt_secret: Arc::new(jwt_secret),
            users: UserRepository::new(),
            dreams: DreamRepository::new(),
        }
    }
}
