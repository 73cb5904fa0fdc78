use nmedia_msg::Post;
use nmedia_ref::UserId;

/// Copy of `post` stamped with whether `viewer` wrote it. Nobody owns
/// anything before sign-in.
pub fn annotate(post: &Post, viewer: Option<UserId>) -> Post {
    Post {
        owned_by_me: is_owned(post, viewer),
        ..post.clone()
    }
}

pub fn is_owned(post: &Post, viewer: Option<UserId>) -> bool {
    viewer == Some(post.author_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post_by(author: i64) -> Post {
        Post {
            author_id: UserId(author),
            ..Post::empty()
        }
    }

    #[test]
    fn test_owned_when_author_matches() {
        assert!(annotate(&post_by(5), Some(UserId(5))).owned_by_me);
    }

    #[test]
    fn test_not_owned_by_someone_else() {
        assert!(!annotate(&post_by(5), Some(UserId(6))).owned_by_me);
    }

    #[test]
    fn test_not_owned_when_signed_out() {
        assert!(!annotate(&post_by(0), None).owned_by_me);
    }

    #[test]
    fn test_annotation_is_recomputed() {
        let owned = annotate(&post_by(5), Some(UserId(5)));
        assert!(!annotate(&owned, Some(UserId(7))).owned_by_me);
    }
}
