use anyhow::Result;
use chrono::Utc;
use contracts::system::auth::{RegisterRequest, UserInfo};
use uuid::Uuid;

use super::repository::{StoredUser, UserRepository};
use crate::shared::error::AppError;
use crate::system::auth::password;

const MIN_PASSWORD_LEN: usize = 6;

/// Регистрация нового пользователя
pub fn register(repo: &UserRepository, dto: RegisterRequest) -> Result<UserInfo, AppError> {
    let username = dto.username.trim();
    let email = dto.email.trim();

    // Валидация
    if username.is_empty() {
        return Err(AppError::BadRequest("Username must not be empty".into()));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Email is not valid".into()));
    }
    if dto.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let info = UserInfo {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: email.to_string(),
    };
    let user = StoredUser {
        info: info.clone(),
        password_hash: password::hash_password(&dto.password)?,
        created_at: Utc::now(),
        last_login_at: None,
    };

    if !repo.insert(user) {
        return Err(AppError::BadRequest("Email is already registered".into()));
    }

    tracing::info!("Registered user {} <{}>", info.username, info.email);
    Ok(info)
}

/// Проверка email/пароля; `None`, если пара неверна
pub fn verify_credentials(
    repo: &UserRepository,
    email: &str,
    password: &str,
) -> Result<Option<UserInfo>> {
    let user = match repo.get_by_email(email.trim()) {
        Some(u) => u,
        None => return Ok(None),
    };

    if !password::verify_password(password, &user.password_hash)? {
        return Ok(None);
    }

    repo.update_last_login(user.info.id);

    Ok(Some(user.info))
}
