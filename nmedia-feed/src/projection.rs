use futures::future;
use log::{debug, trace};
use nmedia_db::Error as RepositoryError;
use nmedia_msg::{FeedItem, Identity, Post};
use nmedia_ref::UserId;
use std::sync::Arc;
use tokio::sync::watch;

use crate::{
    clock::Clock,
    overlay::FeedOverlay,
    ownership::annotate,
    pages::PagesState,
    scope::ScopedTask,
    separator::{SeparatorInserter, SeparatorLabels},
};

/// The feed as presented to one viewer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedSnapshot {
    pub items: Arc<Vec<FeedItem>>,
    /// Identity the items were annotated for.
    pub viewer: Option<UserId>,
    pub end_of_feed: bool,
    pub error: Option<RepositoryError>,
    generation: u64,
}

impl FeedSnapshot {
    /// Projection run that produced this snapshot. Zero before the first
    /// publish.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.items.iter().filter_map(FeedItem::as_post)
    }
}

/// Keeps a [`FeedSnapshot`] in step with the identity, the overlay and the
/// page cache.
///
/// Any identity or overlay change aborts the running projection and starts
/// a new one over the pages already cached. New pages extend the running
/// projection in place.
pub struct FeedProjection {
    output: Arc<watch::Sender<FeedSnapshot>>,
    _driver: ScopedTask,
}

impl FeedProjection {
    /// Must be called within a tokio runtime.
    pub fn start(
        identity: watch::Receiver<Identity>,
        overlay: watch::Receiver<FeedOverlay>,
        pages: watch::Receiver<PagesState>,
        labels: Arc<SeparatorLabels>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let output = Arc::new(watch::Sender::new(FeedSnapshot::default()));
        let driver = ScopedTask::spawn(drive(
            identity,
            overlay,
            pages,
            output.clone(),
            labels,
            clock,
        ));
        Self {
            output,
            _driver: driver,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.output.subscribe()
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.output.borrow().clone()
    }
}

async fn drive(
    mut identity: watch::Receiver<Identity>,
    mut overlay: watch::Receiver<FeedOverlay>,
    pages: watch::Receiver<PagesState>,
    output: Arc<watch::Sender<FeedSnapshot>>,
    labels: Arc<SeparatorLabels>,
    clock: Arc<dyn Clock>,
) {
    let mut running: Option<ScopedTask> = None;
    let mut identity_open = true;
    let mut overlay_open = true;

    loop {
        let viewer = identity.borrow_and_update().id;
        let overlay_now = overlay.borrow_and_update().clone();

        // the counter lives inside the output cell, so a bump and a publish
        // can never interleave
        let mut generation = 0;
        output.send_if_modified(|snapshot| {
            snapshot.generation += 1;
            generation = snapshot.generation;
            false
        });

        drop(running.take());
        debug!("Projecting feed for {:?}, generation {}", viewer, generation);
        running = Some(ScopedTask::spawn(project(
            viewer,
            overlay_now,
            pages.clone(),
            output.clone(),
            labels.clone(),
            clock.now_seconds(),
            generation,
        )));

        loop {
            tokio::select! {
                changed = identity.changed(), if identity_open => match changed {
                    Ok(()) => break,
                    Err(_) => {
                        debug!("Identity source closed, keeping last viewer");
                        identity_open = false;
                    }
                },
                changed = overlay.changed(), if overlay_open => match changed {
                    Ok(()) => break,
                    Err(_) => overlay_open = false,
                },
                else => future::pending::<()>().await,
            }
        }
    }
}

async fn project(
    viewer: Option<UserId>,
    overlay: FeedOverlay,
    mut pages: watch::Receiver<PagesState>,
    output: Arc<watch::Sender<FeedSnapshot>>,
    labels: Arc<SeparatorLabels>,
    now: i64,
    generation: u64,
) {
    let mut inserter = SeparatorInserter::new(now, labels.clone());
    // items not yet published
    let mut fresh_items = Vec::new();
    let mut restart = true;
    let mut epoch = None;
    let mut seen = 0;

    loop {
        let state = pages.borrow_and_update().clone();

        if epoch != Some(state.epoch) {
            trace!("Page epoch {}, starting over", state.epoch);
            inserter = SeparatorInserter::new(now, labels.clone());
            fresh_items.clear();
            restart = true;
            seen = 0;
            epoch = Some(state.epoch);
        }

        let fresh = state.posts.get(seen..).unwrap_or(&[]);
        trace!("Projecting {} new posts", fresh.len());
        for post in fresh {
            if let Some(post) = overlay.apply(state.epoch, post) {
                inserter.push(annotate(&post, viewer), &mut fresh_items);
            }
        }
        seen = state.posts.len();
        if state.end_of_feed {
            inserter.finish(&mut fresh_items);
        }

        let mut superseded = false;
        output.send_if_modified(|current| {
            if current.generation != generation {
                superseded = true;
                return false;
            }
            let mut modified = false;
            if restart {
                let items = std::mem::take(&mut fresh_items);
                if *current.items != items {
                    current.items = Arc::new(items);
                    modified = true;
                }
            } else if !fresh_items.is_empty() {
                Arc::make_mut(&mut current.items).append(&mut fresh_items);
                modified = true;
            }
            if current.viewer != viewer {
                current.viewer = viewer;
                modified = true;
            }
            if current.end_of_feed != state.end_of_feed {
                current.end_of_feed = state.end_of_feed;
                modified = true;
            }
            if current.error != state.error {
                current.error = state.error.clone();
                modified = true;
            }
            modified
        });
        if superseded {
            debug!("Projection {} superseded", generation);
            return;
        }
        restart = false;

        if pages.changed().await.is_err() {
            return;
        }
    }
}
