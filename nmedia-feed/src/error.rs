use nmedia_db::Error as RepositoryError;
use nmedia_ref::{PostId, RefError};
use std::{fmt, io};
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("Failed to read config file, cause: {0}")]
    ReadFile(#[source] io::Error),
    #[error("Failed to parse config, cause: {0}")]
    Json(#[source] serde_json::Error),
}

/// The whole feed could not be loaded or refreshed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum FetchError {
    #[error("Failed to load feed, cause: {0}")]
    Load(#[source] RepositoryError),
    #[error("Failed to refresh feed, cause: {0}")]
    Refresh(#[source] RepositoryError),
}

#[derive(Clone, Debug, ThisError)]
pub enum SaveError {
    #[error("Failed to resolve photo for upload, cause: {0}")]
    Media(#[source] RefError),
    #[error("Failed to save post, cause: {0}")]
    Repository(#[source] RepositoryError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Like,
    Remove,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Like => write!(f, "like"),
            MutationKind::Remove => write!(f, "remove"),
        }
    }
}

/// A like or remove of a single post failed. The rest of the feed is fine.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum MutationError {
    #[error("A {kind} of post {id} is already in flight")]
    AlreadyPending { id: PostId, kind: MutationKind },
    #[error("Failed to {kind} post {id}, cause: {source}")]
    Repository {
        id: PostId,
        kind: MutationKind,
        #[source]
        source: RepositoryError,
    },
}

impl MutationError {
    pub fn id(&self) -> PostId {
        match self {
            MutationError::AlreadyPending { id, .. } => *id,
            MutationError::Repository { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> MutationKind {
        match self {
            MutationError::AlreadyPending { kind, .. } => *kind,
            MutationError::Repository { kind, .. } => *kind,
        }
    }
}
