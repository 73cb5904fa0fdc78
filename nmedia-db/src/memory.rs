use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use log::{debug, trace};
use nmedia_msg::{MediaUpload, Post};
use nmedia_ref::{PostId, UserId};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::sync::Semaphore;

use crate::{Error, Page, PageStream, PostRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    Page,
    Load,
    Refresh,
    Save,
    Like,
    Remove,
}

/// Holds calls of one kind until released, one call per release.
#[derive(Clone, Debug)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    fn new() -> Self {
        Gate(Arc::new(Semaphore::new(0)))
    }

    pub fn release(&self) {
        self.0.add_permits(1);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

struct State {
    // newest first
    posts: Vec<Post>,
    next_id: u64,
    author_id: UserId,
    author: String,
    calls: HashMap<Op, usize>,
    gates: HashMap<Op, Gate>,
    failures: HashMap<Op, VecDeque<Error>>,
    saves: Vec<(Post, Option<MediaUpload>)>,
}

struct Inner {
    state: Mutex<State>,
    page_size: usize,
}

/// Posts kept in memory, paged in fixed-size chunks.
///
/// Every operation can be held behind a [`Gate`] or made to fail, which
/// lets callers script the order in which concurrent requests finish.
#[derive(Clone)]
pub struct MemoryRepository {
    inner: Arc<Inner>,
}

impl MemoryRepository {
    pub fn new(page_size: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    posts: Vec::new(),
                    next_id: 1,
                    author_id: UserId(0),
                    author: String::new(),
                    calls: HashMap::new(),
                    gates: HashMap::new(),
                    failures: HashMap::new(),
                    saves: Vec::new(),
                }),
                page_size: page_size.max(1),
            }),
        }
    }

    pub fn with_posts(self, posts: Vec<Post>) -> Self {
        {
            let mut state = self.inner.state.lock();
            for post in posts {
                state.next_id = state.next_id.max(post.id.0 + 1);
                state.posts.push(post);
            }
            state.posts.sort_by(|a, b| b.id.cmp(&a.id));
        }
        self
    }

    /// Author stamped on posts created through `save`.
    pub fn with_author(self, author_id: UserId, author: impl Into<String>) -> Self {
        {
            let mut state = self.inner.state.lock();
            state.author_id = author_id;
            state.author = author.into();
        }
        self
    }

    pub fn gate(&self, op: Op) -> Gate {
        let mut state = self.inner.state.lock();
        state.gates.entry(op).or_insert_with(Gate::new).clone()
    }

    pub fn ungate(&self, op: Op) {
        self.inner.state.lock().gates.remove(&op);
    }

    pub fn fail_next(&self, op: Op, error: Error) {
        let mut state = self.inner.state.lock();
        state.failures.entry(op).or_default().push_back(error);
    }

    pub fn calls(&self, op: Op) -> usize {
        let state = self.inner.state.lock();
        state.calls.get(&op).copied().unwrap_or(0)
    }

    pub fn posts(&self) -> Vec<Post> {
        self.inner.state.lock().posts.clone()
    }

    pub fn saves(&self) -> Vec<(Post, Option<MediaUpload>)> {
        self.inner.state.lock().saves.clone()
    }

    async fn enter(&self, op: Op) -> Result<(), Error> {
        let gate = {
            let mut state = self.inner.state.lock();
            *state.calls.entry(op).or_default() += 1;
            state.gates.get(&op).cloned()
        };

        if let Some(gate) = gate {
            trace!("{:?} waiting at gate", op);
            gate.pass().await;
        }

        let failure = {
            let mut state = self.inner.state.lock();
            state
                .failures
                .get_mut(&op)
                .and_then(|queue| queue.pop_front())
        };
        match failure {
            Some(error) => {
                debug!("{:?} failing with injected error: {}", op, error);
                Err(error)
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PostRepository for MemoryRepository {
    fn pages(&self) -> PageStream {
        let mut chunks = {
            let state = self.inner.state.lock();
            state
                .posts
                .iter()
                .cloned()
                .chunks(self.inner.page_size)
                .into_iter()
                .map(|chunk| chunk.collect_vec())
                .collect_vec()
        };
        if chunks.is_empty() {
            chunks.push(Vec::new());
        }
        let last = chunks.len() - 1;
        trace!("Paging {} chunks", chunks.len());

        // a failed fetch leaves the cursor where it was, so the next poll
        // retries the same page
        let repository = self.clone();
        stream::unfold(
            (repository, chunks, 0usize),
            move |(repository, chunks, index)| async move {
                if index > last {
                    return None;
                }
                match repository.enter(Op::Page).await {
                    Ok(()) => {
                        let page = Page {
                            posts: chunks[index].clone(),
                            end_of_feed: index == last,
                        };
                        Some((Ok(page), (repository, chunks, index + 1)))
                    }
                    Err(error) => Some((Err(error), (repository, chunks, index))),
                }
            },
        )
        .boxed()
    }

    async fn load(&self) -> Result<(), Error> {
        self.enter(Op::Load).await
    }

    async fn refresh(&self) -> Result<(), Error> {
        self.enter(Op::Refresh).await
    }

    async fn save(&self, post: Post, upload: Option<MediaUpload>) -> Result<Post, Error> {
        self.enter(Op::Save).await?;

        let mut state = self.inner.state.lock();
        state.saves.push((post.clone(), upload));

        if post.is_new() {
            let created = Post {
                id: PostId(state.next_id),
                author_id: state.author_id,
                author: state.author.clone(),
                published: Utc::now().timestamp(),
                owned_by_me: false,
                ..post
            };
            state.next_id += 1;
            state.posts.insert(0, created.clone());
            debug!("Created post {}", created.id);
            return Ok(created);
        }

        let stored = state
            .posts
            .iter_mut()
            .find(|stored| stored.id == post.id)
            .ok_or(Error::NotFound(post.id))?;
        stored.content = post.content;
        debug!("Updated post {}", stored.id);
        Ok(stored.clone())
    }

    async fn like_by_id(&self, id: PostId) -> Result<Post, Error> {
        self.enter(Op::Like).await?;

        let mut state = self.inner.state.lock();
        let stored = state
            .posts
            .iter_mut()
            .find(|stored| stored.id == id)
            .ok_or(Error::NotFound(id))?;
        if stored.liked_by_me {
            stored.liked_by_me = false;
            stored.likes = stored.likes.saturating_sub(1);
        } else {
            stored.liked_by_me = true;
            stored.likes += 1;
        }
        Ok(stored.clone())
    }

    async fn remove_by_id(&self, id: PostId) -> Result<(), Error> {
        self.enter(Op::Remove).await?;

        let mut state = self.inner.state.lock();
        let before = state.posts.len();
        state.posts.retain(|stored| stored.id != id);
        if state.posts.len() == before {
            return Err(Error::NotFound(id));
        }
        Ok(())
    }
}
