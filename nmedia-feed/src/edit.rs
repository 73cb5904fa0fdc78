use log::trace;
use nmedia_msg::{PhotoAttachment, Post};
use tokio::sync::watch;

/// The post being written and the photo picked for it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditDraft {
    pub post: Post,
    pub photo: PhotoAttachment,
}

/// Holds exactly one draft. Draft and photo share one cell, so taking a
/// snapshot and resetting is a single step no concurrent edit can split.
#[derive(Debug)]
pub struct EditBuffer {
    cell: watch::Sender<EditDraft>,
}

impl Default for EditBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EditBuffer {
    pub fn new() -> Self {
        Self {
            cell: watch::Sender::new(EditDraft::default()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EditDraft> {
        self.cell.subscribe()
    }

    pub fn current(&self) -> EditDraft {
        self.cell.borrow().clone()
    }

    pub fn start_edit(&self, post: Post) {
        trace!("Editing post {}", post.id);
        self.cell.send_modify(|draft| draft.post = post);
    }

    /// Returns false, without notifying anyone, when the trimmed text is
    /// already the draft's content.
    pub fn update_content(&self, text: &str) -> bool {
        let text = text.trim();
        self.cell.send_if_modified(|draft| {
            if draft.post.content == text {
                return false;
            }
            draft.post.content = text.to_string();
            true
        })
    }

    pub fn set_photo(&self, photo: PhotoAttachment) {
        self.cell.send_modify(|draft| draft.photo = photo);
    }

    pub fn commit_and_reset(&self) -> EditDraft {
        self.cell.send_replace(EditDraft::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nmedia_ref::{PostId, ResourceRef};
    use std::path::Path;

    fn post(id: u64, content: &str) -> Post {
        Post {
            id: PostId(id),
            content: content.to_string(),
            ..Post::empty()
        }
    }

    #[test]
    fn test_default_draft_is_blank() {
        let buffer = EditBuffer::new();
        let draft = buffer.current();
        assert_eq!(draft.post, Post::empty());
        assert!(draft.photo.is_none());
    }

    #[test]
    fn test_start_edit_replaces_draft() {
        let buffer = EditBuffer::new();
        buffer.start_edit(post(1, "one"));
        buffer.start_edit(post(2, "two"));
        assert_eq!(buffer.current().post, post(2, "two"));
    }

    #[test]
    fn test_update_content_trims_and_skips_no_ops() {
        let buffer = EditBuffer::new();
        let mut rx = buffer.subscribe();

        assert!(buffer.update_content("  hello \n"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().post.content, "hello");

        assert!(!buffer.update_content("hello  "));
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_set_photo_back_to_none() {
        let buffer = EditBuffer::new();
        let photo = ResourceRef::from_path(Path::new("/tmp/cat.png")).unwrap();

        buffer.set_photo(PhotoAttachment::Selected(photo.clone()));
        assert_eq!(buffer.current().photo.resource(), Some(&photo));

        buffer.set_photo(PhotoAttachment::None);
        assert!(buffer.current().photo.is_none());
    }

    #[test]
    fn test_commit_and_reset() {
        let buffer = EditBuffer::new();
        let edited = post(3, "draft");
        buffer.start_edit(edited.clone());
        buffer.set_photo(PhotoAttachment::Selected(
            ResourceRef::from_path(Path::new("/tmp/a.png")).unwrap(),
        ));

        let snapshot = buffer.commit_and_reset();

        assert_eq!(snapshot.post, edited);
        assert!(!snapshot.photo.is_none());
        assert_eq!(buffer.current(), EditDraft::default());
    }
}
