// Wire shapes follow the NMedia server's JSON (camelCase keys).

use nmedia_ref::{PostId, RefError, ResourceRef, UserId};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError};
use std::path::PathBuf;

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub content: String,
    pub author_id: UserId,
    pub author: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default)]
    pub author_avatar: String,
    #[serde(default)]
    pub liked_by_me: bool,
    #[serde(default)]
    pub likes: u64,
    /// Seconds since the unix epoch.
    pub published: i64,
    // derived per viewer, never sent to or read from the server
    #[serde(skip)]
    pub owned_by_me: bool,
}

impl Post {
    /// The blank draft: id 0, empty texts, zero counters.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_new(&self) -> bool {
        self.id.is_new()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Separator {
    pub label: String,
}

impl Separator {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FeedItem {
    Post(Post),
    Separator(Separator),
}

impl FeedItem {
    pub fn as_post(&self) -> Option<&Post> {
        match self {
            FeedItem::Post(post) => Some(post),
            FeedItem::Separator(_) => None,
        }
    }

    pub fn as_separator(&self) -> Option<&Separator> {
        match self {
            FeedItem::Post(_) => None,
            FeedItem::Separator(separator) => Some(separator),
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, FeedItem::Separator(_))
    }
}

impl From<Post> for FeedItem {
    fn from(post: Post) -> Self {
        FeedItem::Post(post)
    }
}

impl From<Separator> for FeedItem {
    fn from(separator: Separator) -> Self {
        FeedItem::Separator(separator)
    }
}

/// Who is signed in. `id` is absent until authentication completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Identity {
    pub id: Option<UserId>,
    pub token: Option<String>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(id: impl Into<UserId>, token: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            token: Some(token.into()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum PhotoAttachment {
    #[default]
    None,
    Selected(ResourceRef),
}

impl PhotoAttachment {
    pub fn resource(&self) -> Option<&ResourceRef> {
        match self {
            PhotoAttachment::None => None,
            PhotoAttachment::Selected(resource) => Some(resource),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, PhotoAttachment::None)
    }
}

impl From<Option<ResourceRef>> for PhotoAttachment {
    fn from(value: Option<ResourceRef>) -> Self {
        match value {
            Some(resource) => PhotoAttachment::Selected(resource),
            None => PhotoAttachment::None,
        }
    }
}

/// A local file ready to be sent along with a post.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaUpload {
    pub file: PathBuf,
}

impl MediaUpload {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }

    pub fn from_attachment(attachment: &PhotoAttachment) -> Result<Option<Self>, RefError> {
        match attachment.resource() {
            Some(resource) => Ok(Some(Self::new(resource.to_file_path()?))),
            None => Ok(None),
        }
    }
}
