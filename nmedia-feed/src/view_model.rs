use log::{debug, info};
use nmedia_db::PostRepository;
use nmedia_msg::{Identity, PhotoAttachment, Post};
use nmedia_ref::PostId;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

use crate::{
    clock::Clock,
    config::FeedConfig,
    edit::{EditBuffer, EditDraft},
    error::MutationError,
    events::{EventSink, FeedEvent},
    orchestrator::Orchestrator,
    overlay::FeedOverlay,
    pages::{PageCache, PagesState},
    projection::{FeedProjection, FeedSnapshot},
    scope::TaskScope,
    status::{FeedStatus, StatusCell},
};

/// The feed screen's state and actions.
///
/// Owns every background task it starts. Dropping the view model aborts
/// the projection, the page stream and any operation still running.
pub struct FeedViewModel {
    orchestrator: Orchestrator,
    buffer: Arc<EditBuffer>,
    status: Arc<StatusCell>,
    pages: PageCache,
    projection: FeedProjection,
    events: Arc<EventSink>,
    scope: TaskScope,
}

impl FeedViewModel {
    /// Starts projecting the feed and launches the initial load. Must be
    /// called within a tokio runtime.
    pub fn new(
        repository: Arc<dyn PostRepository>,
        identity: watch::Receiver<Identity>,
        config: FeedConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let buffer = Arc::new(EditBuffer::new());
        let status = Arc::new(StatusCell::new());
        let overlay = Arc::new(watch::Sender::new(FeedOverlay::default()));
        let pages = PageCache::start(repository.clone(), config.prefetch_pages);
        let projection = FeedProjection::start(
            identity,
            overlay.subscribe(),
            pages.subscribe(),
            Arc::new(config.separator_labels),
            clock,
        );
        let events = Arc::new(EventSink::new(config.event_buffer));
        let orchestrator = Orchestrator::new(
            repository,
            buffer.clone(),
            status.clone(),
            pages.clone(),
            overlay.clone(),
            events.clone(),
        );

        let scope = TaskScope::new();
        scope.spawn(prune_overlay(pages.subscribe(), overlay));

        let view_model = Self {
            orchestrator,
            buffer,
            status,
            pages,
            projection,
            events,
            scope,
        };
        info!("Feed started");
        view_model.load();
        view_model
    }

    pub fn feed(&self) -> watch::Receiver<FeedSnapshot> {
        self.projection.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.projection.snapshot()
    }

    pub fn status(&self) -> watch::Receiver<FeedStatus> {
        self.status.subscribe()
    }

    pub fn draft(&self) -> watch::Receiver<EditDraft> {
        self.buffer.subscribe()
    }

    /// The event receiver. Only the first call gets it, and only events
    /// raised after that call are delivered.
    pub fn take_events(&self) -> Option<mpsc::Receiver<FeedEvent>> {
        self.events.take()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn start_edit(&self, post: Post) {
        self.buffer.start_edit(post);
    }

    pub fn update_content(&self, text: &str) -> bool {
        self.buffer.update_content(text)
    }

    pub fn set_photo(&self, photo: PhotoAttachment) {
        self.buffer.set_photo(photo);
    }

    /// The draft is taken and the buffer reset before this returns. The
    /// outcome arrives as a [`FeedEvent`].
    pub fn save(&self) {
        let save = self.orchestrator.save();
        self.scope.spawn(async move {
            let _ = save.await;
        });
    }

    /// The outcome shows up in `status`.
    pub fn load(&self) {
        let orchestrator = self.orchestrator.clone();
        self.scope.spawn(async move {
            let _ = orchestrator.load().await;
        });
    }

    pub fn refresh(&self) {
        let orchestrator = self.orchestrator.clone();
        self.scope.spawn(async move {
            let _ = orchestrator.refresh().await;
        });
    }

    pub fn load_more(&self) {
        self.pages.load_more();
    }

    pub async fn like_by_id(&self, id: PostId) -> Result<Post, MutationError> {
        self.orchestrator.like_by_id(id).await
    }

    pub async fn remove_by_id(&self, id: PostId) -> Result<(), MutationError> {
        self.orchestrator.remove_by_id(id).await
    }
}

/// Forgets overlay entries once a newer page generation is on screen.
async fn prune_overlay(
    mut pages: watch::Receiver<PagesState>,
    overlay: Arc<watch::Sender<FeedOverlay>>,
) {
    let mut epoch = 0;
    loop {
        let current = pages.borrow_and_update().epoch;
        if current != epoch {
            epoch = current;
            if overlay.send_if_modified(|overlay| overlay.prune(epoch)) {
                debug!("Pruned overlay for epoch {}", epoch);
            }
        }
        if pages.changed().await.is_err() {
            return;
        }
    }
}
