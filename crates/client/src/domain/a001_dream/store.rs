use contracts::domain::a001_dream::{Dream, DreamId, DreamProgressEvent};
use tokio::sync::watch;

/// Снимок коллекций для подписчиков
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DreamSnapshot {
    pub pending: Vec<Dream>,
    /// Все завершённые сны, включая failed
    pub completed: Vec<Dream>,
}

/// State container for the two dream collections.
///
/// Writes go through `&mut self` on the single owner; readers subscribe to
/// snapshots published after every mutation. An id is never present in both
/// collections at once.
#[derive(Debug)]
pub struct DreamStore {
    pending: Vec<Dream>,
    completed: Vec<Dream>,
    tx: watch::Sender<DreamSnapshot>,
}

impl Default for DreamStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DreamStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(DreamSnapshot::default());
        Self {
            pending: Vec::new(),
            completed: Vec::new(),
            tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DreamSnapshot> {
        self.tx.subscribe()
    }

    pub fn pending(&self) -> &[Dream] {
        &self.pending
    }

    pub fn completed(&self) -> &[Dream] {
        &self.completed
    }

    pub fn get(&self, id: DreamId) -> Option<&Dream> {
        self.pending
            .iter()
            .chain(self.completed.iter())
            .find(|d| d.id == id)
    }

    pub fn snapshot(&self) -> DreamSnapshot {
        DreamSnapshot {
            pending: self.pending.clone(),
            completed: self.completed.clone(),
        }
    }

    /// Replace both collections from a server listing
    pub fn replace_all(&mut self, dreams: Vec<Dream>) {
        let mut seen = std::collections::HashSet::new();
        let (pending, completed): (Vec<Dream>, Vec<Dream>) = dreams
            .into_iter()
            .filter(|d| seen.insert(d.id))
            .partition(|d| d.status.is_pending());
        self.pending = pending;
        self.completed = completed;
        self.publish();
    }

    /// Новый сон после отправки; добавляется в конец pending
    pub fn add_pending(&mut self, dream: Dream) {
        if self.get(dream.id).is_some() {
            self.reconcile(dream);
            return;
        }
        self.pending.push(dream);
        self.publish();
    }

    /// Apply a live progress event to a pending dream.
    ///
    /// Only non-terminal statuses are applied here; the move to `completed`
    /// happens in [`reconcile`](Self::reconcile) after the canonical refresh.
    pub fn apply_event(&mut self, id: DreamId, event: &DreamProgressEvent) {
        if event.status.is_terminal() {
            return;
        }
        let Some(dream) = self.pending.iter_mut().find(|d| d.id == id) else {
            return;
        };
        if dream.status == event.status {
            return;
        }
        match dream.apply_status(event.status) {
            Ok(()) => self.publish(),
            Err(e) => tracing::warn!("Ignoring progress event: {}", e),
        }
    }

    /// Reconcile a refreshed dream into the collections.
    ///
    /// Pending-like dreams keep their place in `pending` (new ones are appended),
    /// terminal ones are appended to `completed`. A refresh that would move the status backwards is ignored
    /// and the local copy kept. Returns the stored copy.
    pub fn reconcile(&mut self, refreshed: Dream) -> Dream {
        if let Some(local) = self.get(refreshed.id) {
            if !local.status.can_transition_to(refreshed.status) {
                tracing::warn!(
                    "Dream {} refreshed as {} but local copy is {}, keeping local",
                    refreshed.id,
                    refreshed.status,
                    local.status
                );
                return local.clone();
            }
        }

        let id = refreshed.id;
        let pending_pos = self.pending.iter().position(|d| d.id == id);
        self.pending.retain(|d| d.id != id);
        self.completed.retain(|d| d.id != id);

        if refreshed.status.is_pending() {
            match pending_pos {
                // место в списке сохраняется
                Some(pos) => self.pending.insert(pos.min(self.pending.len()), refreshed.clone()),
                None => self.pending.push(refreshed.clone()),
            }
        } else {
            self.completed.push(refreshed.clone());
        }
        self.publish();
        refreshed
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.completed.clear();
        self.publish();
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}
