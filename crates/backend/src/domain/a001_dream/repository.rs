use std::collections::HashMap;
use std::sync::Arc;

use contracts::domain::a001_dream::{Dream, DreamId, DreamProgressEvent};
use parking_lot::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

struct DreamEntry {
    owner: Uuid,
    dream: Dream,
    /// Последнее событие прогресса; подписчики потока событий читают отсюда
    progress: watch::Sender<DreamProgressEvent>,
}

/// In-memory хранилище Dream, с разделением по владельцу
#[derive(Clone, Default)]
pub struct DreamRepository {
    inner: Arc<RwLock<HashMap<DreamId, DreamEntry>>>,
}

impl DreamRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, owner: Uuid, dream: Dream) {
        let initial = DreamProgressEvent::new(dream.status, 0.0);
        let (progress, _) = watch::channel(initial);
        self.inner.write().insert(
            dream.id,
            DreamEntry {
                owner,
                dream,
                progress,
            },
        );
    }

    /// Dream пользователя, новые первыми
    pub fn list_by_owner(&self, owner: Uuid) -> Vec<Dream> {
        let inner = self.inner.read();
        let mut dreams: Vec<Dream> = inner
            .values()
            .filter(|e| e.owner == owner)
            .map(|e| e.dream.clone())
            .collect();
        dreams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        dreams
    }

    pub fn get(&self, owner: Uuid, id: DreamId) -> Option<Dream> {
        let inner = self.inner.read();
        inner
            .get(&id)
            .filter(|e| e.owner == owner)
            .map(|e| e.dream.clone())
    }

    pub fn subscribe(&self, owner: Uuid, id: DreamId) -> Option<watch::Receiver<DreamProgressEvent>> {
        let inner = self.inner.read();
        inner
            .get(&id)
            .filter(|e| e.owner == owner)
            .map(|e| e.progress.subscribe())
    }

    /// Записать событие прогресса и обновить Dream.
    ///
    /// Возвращает `false`, если Dream не найден или переход статуса недопустим.
    pub fn record_progress(
        &self,
        id: DreamId,
        event: DreamProgressEvent,
        update: impl FnOnce(&mut Dream),
    ) -> bool {
        let mut inner = self.inner.write();
        let Some(entry) = inner.get_mut(&id) else {
            return false;
        };

        if let Err(e) = entry.dream.apply_status(event.status) {
            tracing::warn!("{}", e);
            return false;
        }
        update(&mut entry.dream);
        entry.progress.send_replace(event);
        true
    }
}
