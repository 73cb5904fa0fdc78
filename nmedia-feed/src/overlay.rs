use nmedia_msg::Post;
use nmedia_ref::PostId;
use std::collections::HashMap;

/// Confirmed mutations laid over the cached pages until the page cache is
/// reloaded with data that already contains them.
///
/// Each entry remembers the page-cache generation that was current when it
/// was recorded. It applies to pages of that generation or older and is
/// ignored once a newer generation is on screen.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedOverlay {
    updated: HashMap<PostId, (u64, Post)>,
    removed: HashMap<PostId, u64>,
}

impl FeedOverlay {
    pub fn update(&mut self, generation: u64, post: Post) {
        self.updated.insert(post.id, (generation, post));
    }

    pub fn remove(&mut self, generation: u64, id: PostId) {
        self.updated.remove(&id);
        self.removed.insert(id, generation);
    }

    /// Drops entries that no generation at or after `epoch` will apply.
    /// Returns whether anything was dropped.
    pub fn prune(&mut self, epoch: u64) -> bool {
        let before = self.updated.len() + self.removed.len();
        self.updated.retain(|_, (generation, _)| *generation >= epoch);
        self.removed.retain(|_, generation| *generation >= epoch);
        self.updated.len() + self.removed.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.removed.is_empty()
    }

    /// The post as it should be shown on a page of generation `epoch`, or
    /// `None` when it was removed.
    pub fn apply(&self, epoch: u64, post: &Post) -> Option<Post> {
        if let Some(generation) = self.removed.get(&post.id) {
            if *generation >= epoch {
                return None;
            }
        }
        match self.updated.get(&post.id) {
            Some((generation, updated)) if *generation >= epoch => Some(updated.clone()),
            _ => Some(post.clone()),
        }
    }
}
