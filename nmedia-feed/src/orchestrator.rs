use log::{debug, info, warn};
use nmedia_db::PostRepository;
use nmedia_msg::{MediaUpload, PhotoAttachment, Post};
use nmedia_ref::PostId;
use parking_lot::Mutex;
use std::{collections::HashSet, future::Future, sync::Arc};
use tokio::sync::watch;

use crate::{
    edit::EditBuffer,
    error::{FetchError, MutationError, MutationKind, SaveError},
    events::{EventSink, FeedEvent},
    overlay::FeedOverlay,
    pages::PageCache,
    status::{FeedStatus, StatusCell},
};

type InFlightSet = Arc<Mutex<HashSet<(MutationKind, PostId)>>>;

/// Marks a mutation as running until dropped.
struct InFlight {
    key: (MutationKind, PostId),
    set: InFlightSet,
}

impl InFlight {
    fn acquire(set: &InFlightSet, kind: MutationKind, id: PostId) -> Result<Self, MutationError> {
        if !set.lock().insert((kind, id)) {
            return Err(MutationError::AlreadyPending { id, kind });
        }
        Ok(Self {
            key: (kind, id),
            set: set.clone(),
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.lock().remove(&self.key);
    }
}

/// Runs feed operations against the repository and reports their outcome
/// through the status cell, the overlay and the event channel.
#[derive(Clone)]
pub struct Orchestrator {
    repository: Arc<dyn PostRepository>,
    buffer: Arc<EditBuffer>,
    status: Arc<StatusCell>,
    pages: PageCache,
    overlay: Arc<watch::Sender<FeedOverlay>>,
    events: Arc<EventSink>,
    in_flight: InFlightSet,
}

impl Orchestrator {
    pub fn new(
        repository: Arc<dyn PostRepository>,
        buffer: Arc<EditBuffer>,
        status: Arc<StatusCell>,
        pages: PageCache,
        overlay: Arc<watch::Sender<FeedOverlay>>,
        events: Arc<EventSink>,
    ) -> Self {
        Self {
            repository,
            buffer,
            status,
            pages,
            overlay,
            events,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn load(&self) -> Result<(), FetchError> {
        let ticket = self.status.begin(FeedStatus::Loading);
        match self.repository.load().await {
            Ok(()) => {
                self.status.settle(ticket, FeedStatus::Idle);
                Ok(())
            }
            Err(error) => {
                warn!("Failed to load feed, cause: {}", error);
                self.status.settle(ticket, FeedStatus::Error);
                Err(FetchError::Load(error))
            }
        }
    }

    pub async fn refresh(&self) -> Result<(), FetchError> {
        let ticket = self.status.begin(FeedStatus::Refreshing);
        match self.repository.refresh().await {
            Ok(()) => {
                self.pages.reload();
                self.status.settle(ticket, FeedStatus::Idle);
                Ok(())
            }
            Err(error) => {
                warn!("Failed to refresh feed, cause: {}", error);
                self.status.settle(ticket, FeedStatus::Error);
                Err(FetchError::Refresh(error))
            }
        }
    }

    /// Takes the draft and resets the buffer right away, then returns the
    /// work that sends it. The buffer is reset even if the returned future
    /// is never polled.
    pub fn save(&self) -> impl Future<Output = Result<Post, SaveError>> + Send + 'static {
        let draft = self.buffer.commit_and_reset();
        let this = self.clone();
        async move {
            let result = this.send_draft(draft.post, &draft.photo).await;
            match &result {
                Ok(saved) => {
                    this.events.emit(FeedEvent::PostSaved(saved.clone()));
                }
                Err(error) => {
                    warn!("{}", error);
                    this.events.emit(FeedEvent::SaveFailed(error.clone()));
                }
            }
            result
        }
    }

    async fn send_draft(&self, post: Post, photo: &PhotoAttachment) -> Result<Post, SaveError> {
        let upload = MediaUpload::from_attachment(photo).map_err(SaveError::Media)?;
        let created = post.is_new();

        let saved = self
            .repository
            .save(post, upload)
            .await
            .map_err(SaveError::Repository)?;

        if created {
            info!("Post {} created, reloading feed", saved.id);
            self.pages.reload();
        } else {
            debug!("Post {} updated", saved.id);
            self.patch(saved.clone());
        }
        Ok(saved)
    }

    pub async fn like_by_id(&self, id: PostId) -> Result<Post, MutationError> {
        let result = self.like(id).await;
        self.report(result)
    }

    pub async fn remove_by_id(&self, id: PostId) -> Result<(), MutationError> {
        let result = self.remove(id).await;
        self.report(result)
    }

    async fn like(&self, id: PostId) -> Result<Post, MutationError> {
        let _guard = InFlight::acquire(&self.in_flight, MutationKind::Like, id)?;

        let liked = self
            .repository
            .like_by_id(id)
            .await
            .map_err(|source| MutationError::Repository {
                id,
                kind: MutationKind::Like,
                source,
            })?;

        self.patch(liked.clone());
        Ok(liked)
    }

    async fn remove(&self, id: PostId) -> Result<(), MutationError> {
        let _guard = InFlight::acquire(&self.in_flight, MutationKind::Remove, id)?;

        self.repository
            .remove_by_id(id)
            .await
            .map_err(|source| MutationError::Repository {
                id,
                kind: MutationKind::Remove,
                source,
            })?;

        // pages fetched by a reload that began before the confirmation may
        // predate it, so the entry is tagged with the newest generation
        let generation = self.pages.generation();
        self.overlay
            .send_modify(|overlay| overlay.remove(generation, id));
        Ok(())
    }

    fn patch(&self, post: Post) {
        let generation = self.pages.generation();
        self.overlay
            .send_modify(|overlay| overlay.update(generation, post));
    }

    fn report<T>(&self, result: Result<T, MutationError>) -> Result<T, MutationError> {
        if let Err(error) = &result {
            warn!("{}", error);
            self.events.emit(FeedEvent::MutationFailed(error.clone()));
        }
        result
    }
}
