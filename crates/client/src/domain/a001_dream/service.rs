use contracts::domain::a001_dream::{Dream, DreamCreationRequest, DreamId, DreamProgressEvent};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::api;
use super::events::ProgressStream;
use super::store::{DreamSnapshot, DreamStore};
use crate::shared::api_utils::ApiClient;
use crate::shared::error::ApiError;

/// Итог сопровождения генерации
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// Stream ended and the canonical record was fetched
    Finished(Dream),
    Cancelled,
}

/// Изменение коллекций, пришедшее от [`GenerationFollower`]
#[derive(Debug, Clone, PartialEq)]
pub enum DreamUpdate {
    Progress { id: DreamId, event: DreamProgressEvent },
    Refreshed(Dream),
}

impl DreamUpdate {
    pub fn dream_id(&self) -> DreamId {
        match self {
            DreamUpdate::Progress { id, .. } => *id,
            DreamUpdate::Refreshed(dream) => dream.id,
        }
    }
}

/// Owner of the dream collections: submission, progress and reconciliation.
///
/// Progress streams are consumed by [`GenerationFollower`]s, which only talk
/// to the network and send [`DreamUpdate`]s back here. The owner applies them
/// with [`apply_pending_updates`](Self::apply_pending_updates) or
/// [`apply_next_update`](Self::apply_next_update), so any number of
/// generations can be followed while the owner keeps submitting and refreshing.
pub struct DreamService {
    api: ApiClient,
    store: DreamStore,
    last_error: Option<String>,
    updates_tx: mpsc::UnboundedSender<DreamUpdate>,
    updates_rx: mpsc::UnboundedReceiver<DreamUpdate>,
}

impl DreamService {
    pub fn new(api: ApiClient) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            api,
            store: DreamStore::new(),
            last_error: None,
            updates_tx,
            updates_rx,
        }
    }

    pub fn store(&self) -> &DreamStore {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<DreamSnapshot> {
        self.store.subscribe()
    }

    /// Last user-facing error from [`load_dreams`](Self::load_dreams)
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Загрузить список снов и разложить по коллекциям
    pub async fn load_dreams(&mut self) -> Result<(), ApiError> {
        match api::fetch_dreams(&self.api).await {
            Ok(dreams) => {
                tracing::info!("Loaded {} dreams", dreams.len());
                self.store.replace_all(dreams);
                self.last_error = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to load dreams: {}", e);
                self.last_error = Some(format!("Failed to load dreams: {}", e));
                Err(e)
            }
        }
    }

    /// Validate locally, submit, and append the new dream to `pending`
    pub async fn submit_dream(&mut self, request: &DreamCreationRequest) -> Result<Dream, ApiError> {
        request.validate().map_err(ApiError::BadRequest)?;

        let request = DreamCreationRequest {
            tags: request.normalized_tags(),
            ..request.clone()
        };
        let dream = api::submit_dream(&self.api, &request).await?;
        tracing::info!("Dream {} submitted ({})", dream.id, dream.status);
        self.store.add_pending(dream.clone());
        Ok(dream)
    }

    pub async fn watch_progress(
        &self,
        id: DreamId,
        cancel: CancellationToken,
    ) -> Result<ProgressStream, ApiError> {
        api::open_progress_stream(&self.api, id, cancel).await
    }

    /// Перечитать сон с сервера и сверить коллекции
    pub async fn refresh_dream(&mut self, id: DreamId) -> Result<Dream, ApiError> {
        let refreshed = api::fetch_dream(&self.api, id).await?;
        Ok(self.store.reconcile(refreshed))
    }

    /// Detached handle for following generations without borrowing the service
    pub fn follower(&self) -> GenerationFollower {
        GenerationFollower {
            api: self.api.clone(),
            updates: self.updates_tx.clone(),
        }
    }

    /// Применить все накопившиеся обновления; возвращает их количество
    pub fn apply_pending_updates(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            self.apply_update(update);
            applied += 1;
        }
        applied
    }

    /// Wait for the next update from any follower and apply it.
    ///
    /// Returns the id of the dream it touched.
    pub async fn apply_next_update(&mut self) -> Option<DreamId> {
        let update = self.updates_rx.recv().await?;
        let id = update.dream_id();
        self.apply_update(update);
        Some(id)
    }

    fn apply_update(&mut self, update: DreamUpdate) {
        match update {
            DreamUpdate::Progress { id, event } => self.store.apply_event(id, &event),
            DreamUpdate::Refreshed(dream) => {
                self.store.reconcile(dream);
            }
        }
    }

    /// Follow one generation and apply its updates as they arrive.
    ///
    /// Holds the service for the whole stream; use [`follower`](Self::follower)
    /// to follow several dreams at once. `Finished` carries the reconciled copy.
    pub async fn follow_generation<F>(
        &mut self,
        id: DreamId,
        cancel: CancellationToken,
        on_event: F,
    ) -> Result<GenerationOutcome, ApiError>
    where
        F: FnMut(&DreamProgressEvent),
    {
        let follower = self.follower();
        let follow = follower.follow(id, cancel, on_event);
        tokio::pin!(follow);

        let outcome = loop {
            tokio::select! {
                outcome = &mut follow => break outcome?,
                Some(update) = self.updates_rx.recv() => self.apply_update(update),
            }
        };
        self.apply_pending_updates();

        Ok(match outcome {
            GenerationOutcome::Finished(dream) => {
                GenerationOutcome::Finished(self.store.get(dream.id).cloned().unwrap_or(dream))
            }
            GenerationOutcome::Cancelled => GenerationOutcome::Cancelled,
        })
    }

    /// Очистить коллекции (выход из аккаунта).
    ///
    /// Followers started before this point are detached: their updates are dropped.
    pub fn clear(&mut self) {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        self.updates_tx = updates_tx;
        self.updates_rx = updates_rx;
        self.store.clear();
        self.last_error = None;
    }
}

/// Consumes one progress stream at a time and reports back to its [`DreamService`].
///
/// Cheap to clone and `Send`; spawn as many as there are dreams to follow.
#[derive(Clone)]
pub struct GenerationFollower {
    api: ApiClient,
    updates: mpsc::UnboundedSender<DreamUpdate>,
}

impl GenerationFollower {
    /// Stream progress into `on_event` until the server closes the stream,
    /// then fetch the canonical record.
    ///
    /// A transport error ends the stream early; the refresh still runs.
    /// Cancellation skips the refresh.
    pub async fn follow<F>(
        &self,
        id: DreamId,
        cancel: CancellationToken,
        mut on_event: F,
    ) -> Result<GenerationOutcome, ApiError>
    where
        F: FnMut(&DreamProgressEvent),
    {
        let mut stream = api::open_progress_stream(&self.api, id, cancel.clone()).await?;

        while let Some(item) = stream.next().await {
            match item {
                Ok(event) => {
                    on_event(&event);
                    self.send(DreamUpdate::Progress { id, event });
                }
                Err(e) => {
                    tracing::warn!("Progress stream for dream {} interrupted: {}", id, e);
                }
            }
        }
        drop(stream);

        if cancel.is_cancelled() {
            tracing::info!("Following dream {} cancelled", id);
            return Ok(GenerationOutcome::Cancelled);
        }

        let dream = api::fetch_dream(&self.api, id).await?;
        self.send(DreamUpdate::Refreshed(dream.clone()));
        Ok(GenerationOutcome::Finished(dream))
    }

    fn send(&self, update: DreamUpdate) {
        if self.updates.send(update).is_err() {
            tracing::debug!("Dream collections were reset, update dropped");
        }
    }
}
