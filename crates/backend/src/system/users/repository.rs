use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use contracts::system::auth::UserInfo;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::system::auth::jwt::EXP_LEEWAY_SECS;

/// Пользователь в хранилище (вместе с хешем пароля)
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub info: UserInfo,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, StoredUser>,
    /// email (lowercase) -> user id
    by_email: HashMap<String, Uuid>,
    /// jti отозванных токенов -> exp токена (unix seconds)
    revoked: HashMap<String, i64>,
}

/// In-memory хранилище пользователей
#[derive(Clone, Default)]
pub struct UserRepository {
    inner: Arc<RwLock<Inner>>,
}

impl UserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Сохранить пользователя; `false`, если email уже занят
    pub fn insert(&self, user: StoredUser) -> bool {
        let mut inner = self.inner.write();
        let key = user.info.email.to_lowercase();
        if inner.by_email.contains_key(&key) {
            return false;
        }
        inner.by_email.insert(key, user.info.id);
        inner.users.insert(user.info.id, user);
        true
    }

    pub fn get_by_id(&self, id: Uuid) -> Option<StoredUser> {
        self.inner.read().users.get(&id).cloned()
    }

    pub fn get_by_email(&self, email: &str) -> Option<StoredUser> {
        let inner = self.inner.read();
        let id = inner.by_email.get(&email.to_lowercase())?;
        inner.users.get(id).cloned()
    }

    pub fn update_last_login(&self, id: Uuid) {
        if let Some(user) = self.inner.write().users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
        }
    }

    /// Отозвать токен. Запись живёт до `exp` плюс допуск проверки;
    /// истёкшие записи удаляются при каждом отзыве.
    pub fn revoke(&self, jti: &str, exp: i64) {
        let cutoff = Utc::now().timestamp() - EXP_LEEWAY_SECS as i64;
        let mut inner = self.inner.write();
        inner.revoked.retain(|_, expires| *expires > cutoff);
        if exp > cutoff {
            inner.revoked.insert(jti.to_string(), exp);
        }
    }

    pub fn is_revoked(&self, jti: &str) -> bool {
        self.inner.read().revoked.contains_key(jti)
    }

    pub fn count(&self) -> usize {
        self.inner.read().users.len()
    }

    pub fn revoked_count(&self) -> usize {
        self.inner.read().revoked.len()
    }
}
