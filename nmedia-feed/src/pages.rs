use futures::StreamExt;
use log::{debug, trace, warn};
use nmedia_db::{Error as RepositoryError, PageStream, PostRepository};
use nmedia_msg::Post;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{mpsc, watch};

use crate::scope::ScopedTask;

/// Everything fetched so far from the current source stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PagesState {
    pub posts: Arc<Vec<Post>>,
    pub end_of_feed: bool,
    /// Last page fetch that failed, cleared by the next page that succeeds.
    pub error: Option<RepositoryError>,
    /// Generation of the source stream `posts` came from. Zero until the
    /// first page arrives.
    pub epoch: u64,
}

struct Inner {
    repository: Arc<dyn PostRepository>,
    state: Arc<watch::Sender<PagesState>>,
    demand: Mutex<mpsc::UnboundedSender<()>>,
    pump: Mutex<Option<ScopedTask>>,
    generation: Arc<AtomicU64>,
    prefetch_pages: usize,
}

/// Materializes pages from the repository's lazy stream, one page per unit
/// of demand.
///
/// A reload swaps in a fresh source stream. The posts of the previous
/// stream stay visible until the first page of the new one arrives.
#[derive(Clone)]
pub struct PageCache {
    inner: Arc<Inner>,
}

impl PageCache {
    /// Must be called within a tokio runtime.
    pub fn start(repository: Arc<dyn PostRepository>, prefetch_pages: usize) -> Self {
        let (demand, _) = mpsc::unbounded_channel();
        let cache = PageCache {
            inner: Arc::new(Inner {
                repository,
                state: Arc::new(watch::Sender::new(PagesState::default())),
                demand: Mutex::new(demand),
                pump: Mutex::new(None),
                generation: Arc::new(AtomicU64::new(0)),
                prefetch_pages,
            }),
        };
        cache.reload();
        cache
    }

    pub fn subscribe(&self) -> watch::Receiver<PagesState> {
        self.inner.state.subscribe()
    }

    pub fn current(&self) -> PagesState {
        self.inner.state.borrow().clone()
    }

    /// Generation of the newest source stream, displayed or not.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Asks for one more page. Ignored once the feed is exhausted.
    pub fn load_more(&self) {
        if self.inner.demand.lock().send(()).is_err() {
            trace!("Demand after end of feed ignored");
        }
    }

    /// Starts over from a fresh source stream, aborting the previous pump.
    /// Returns the new generation.
    pub fn reload(&self) -> u64 {
        // held across the swap so concurrent reloads install pumps in
        // generation order
        let mut pump = self.inner.pump.lock();

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let (demand_tx, demand_rx) = mpsc::unbounded_channel();
        for _ in 0..self.inner.prefetch_pages {
            let _ = demand_tx.send(());
        }
        *self.inner.demand.lock() = demand_tx;

        debug!("Starting page stream, generation {}", generation);
        *pump = Some(ScopedTask::spawn(run_pump(
            self.inner.repository.pages(),
            demand_rx,
            self.inner.state.clone(),
            self.inner.generation.clone(),
            generation,
        )));

        generation
    }
}

async fn run_pump(
    mut pages: PageStream,
    mut demand: mpsc::UnboundedReceiver<()>,
    state: Arc<watch::Sender<PagesState>>,
    current: Arc<AtomicU64>,
    generation: u64,
) {
    let is_current = || current.load(Ordering::SeqCst) == generation;
    let mut first = true;

    while demand.recv().await.is_some() {
        let next = pages.next().await;
        if !is_current() {
            debug!("Page stream {} superseded", generation);
            return;
        }

        match next {
            Some(Ok(page)) => {
                let end_of_feed = page.end_of_feed;
                trace!(
                    "Page of {} posts, generation {}, end of feed: {}",
                    page.posts.len(),
                    generation,
                    end_of_feed
                );
                state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    if first {
                        state.posts = Arc::new(page.posts);
                        state.epoch = generation;
                    } else {
                        Arc::make_mut(&mut state.posts).extend(page.posts);
                    }
                    state.end_of_feed = end_of_feed;
                    state.error = None;
                    true
                });
                first = false;
                if end_of_feed {
                    break;
                }
            }
            Some(Err(error)) => {
                warn!("Failed to fetch page, cause: {}", error);
                state.send_if_modified(|state| {
                    if !is_current() {
                        return false;
                    }
                    state.error = Some(error);
                    true
                });
            }
            None => {
                // the stream ran out without flagging its last page
                state.send_if_modified(|state| {
                    if !is_current() || state.end_of_feed {
                        return false;
                    }
                    if first {
                        state.posts = Arc::new(Vec::new());
                        state.epoch = generation;
                    }
                    state.end_of_feed = true;
                    true
                });
                break;
            }
        }
    }
    debug!("Page stream {} complete", generation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmedia_db::{MemoryRepository, Op};
    use nmedia_ref::PostId;
    use std::time::Duration;
    use tokio::time::timeout;

    fn post(id: u64) -> Post {
        Post {
            id: PostId(id),
            ..Post::empty()
        }
    }

    fn ids(state: &PagesState) -> Vec<u64> {
        state.posts.iter().map(|post| post.id.0).collect()
    }

    async fn wait_for(
        rx: &mut watch::Receiver<PagesState>,
        f: impl FnMut(&PagesState) -> bool,
    ) -> PagesState {
        timeout(Duration::from_secs(5), rx.wait_for(f))
            .await
            .expect("timed out")
            .expect("cache dropped")
            .clone()
    }

    #[tokio::test]
    async fn test_prefetch_then_load_more() {
        let repository = MemoryRepository::new(2).with_posts((1..=5).map(post).collect());
        let cache = PageCache::start(Arc::new(repository.clone()), 1);
        let mut rx = cache.subscribe();

        let state = wait_for(&mut rx, |state| state.posts.len() == 2).await;
        assert_eq!(ids(&state), vec![5, 4]);
        assert_eq!(state.epoch, 1);
        assert!(!state.end_of_feed);

        cache.load_more();
        cache.load_more();
        let state = wait_for(&mut rx, |state| state.end_of_feed).await;
        assert_eq!(ids(&state), vec![5, 4, 3, 2, 1]);

        cache.load_more();
        tokio::task::yield_now().await;
        assert_eq!(repository.calls(Op::Page), 3);
    }

    #[tokio::test]
    async fn test_failed_page_is_recorded_and_retried() {
        let repository = MemoryRepository::new(1).with_posts((1..=2).map(post).collect());
        repository.fail_next(
            Op::Page,
            RepositoryError::Unavailable("offline".to_string()),
        );
        let cache = PageCache::start(Arc::new(repository.clone()), 1);
        let mut rx = cache.subscribe();

        let state = wait_for(&mut rx, |state| state.error.is_some()).await;
        assert!(state.posts.is_empty());

        cache.load_more();
        let state = wait_for(&mut rx, |state| !state.posts.is_empty()).await;
        assert_eq!(ids(&state), vec![2]);
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_reload_keeps_old_posts_until_first_page() {
        let repository = MemoryRepository::new(10).with_posts(vec![post(1)]);
        let cache = PageCache::start(Arc::new(repository.clone()), 1);
        let mut rx = cache.subscribe();
        wait_for(&mut rx, |state| state.end_of_feed).await;

        let gate = repository.gate(Op::Page);
        let repository = repository.with_posts(vec![post(2)]);
        assert_eq!(cache.reload(), 2);
        tokio::task::yield_now().await;
        assert_eq!(ids(&cache.current()), vec![1]);
        assert_eq!(cache.current().epoch, 1);

        gate.release();
        let state = wait_for(&mut rx, |state| state.epoch == 2).await;
        assert_eq!(ids(&state), vec![2, 1]);
        drop(repository);
    }

    #[tokio::test]
    async fn test_superseded_stream_never_publishes() {
        let repository = MemoryRepository::new(10).with_posts(vec![post(1)]);
        let gate = repository.gate(Op::Page);
        let cache = PageCache::start(Arc::new(repository.clone()), 1);
        tokio::task::yield_now().await;

        cache.reload();
        gate.release();
        gate.release();

        let mut rx = cache.subscribe();
        let state = wait_for(&mut rx, |state| state.end_of_feed).await;
        assert_eq!(state.epoch, 2);
    }
}
