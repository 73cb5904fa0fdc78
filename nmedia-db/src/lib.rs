use async_trait::async_trait;
use futures::stream::BoxStream;
use nmedia_msg::{MediaUpload, Post};
use nmedia_ref::PostId;
use thiserror::Error as ThisError;

pub mod memory;
pub use memory::{Gate, MemoryRepository, Op};

#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum Error {
    #[error("Repository unavailable, cause: {0}")]
    Unavailable(String),
    #[error("Post {0} not found")]
    NotFound(PostId),
    #[error("Request rejected, cause: {0}")]
    Rejected(String),
}

/// One batch of posts from the paged source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Page {
    pub posts: Vec<Post>,
    /// No further pages follow this one.
    pub end_of_feed: bool,
}

pub type PageStream = BoxStream<'static, Result<Page, Error>>;

/// Backing store and network access for posts.
///
/// `pages` hands out a lazy stream that starts at the top of the feed,
/// newest first. Nothing is fetched until the stream is polled, and the
/// stream may never end. An `Err` item does not consume its page: polling
/// again retries the same page.
#[async_trait]
pub trait PostRepository: Send + Sync {
    fn pages(&self) -> PageStream;

    async fn load(&self) -> Result<(), Error>;

    async fn refresh(&self) -> Result<(), Error>;

    async fn save(&self, post: Post, upload: Option<MediaUpload>) -> Result<Post, Error>;

    /// Toggles the viewer's like and returns the post as the server now has it.
    async fn like_by_id(&self, id: PostId) -> Result<Post, Error>;

    async fn remove_by_id(&self, id: PostId) -> Result<(), Error>;
}
