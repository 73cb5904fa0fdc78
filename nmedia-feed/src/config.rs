use log::debug;
use serde::{Deserialize, Serialize};
use std::{io, path::Path};
use tokio::fs::read;

use crate::{error::ConfigError, separator::SeparatorLabels};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    pub separator_labels: SeparatorLabels,
    /// Pages requested as soon as a page cache starts.
    pub prefetch_pages: usize,
    /// Undelivered events kept for the presentation layer.
    pub event_buffer: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            separator_labels: SeparatorLabels::default(),
            prefetch_pages: 1,
            event_buffer: 16,
        }
    }
}

impl FeedConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let bytes = read(path.as_ref()).await.map_err(ConfigError::ReadFile)?;
        serde_json::from_slice(&bytes).map_err(ConfigError::Json)
    }

    /// Like `load`, but a missing file yields the defaults.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match Self::load(path.as_ref()).await {
            Err(ConfigError::ReadFile(error)) if error.kind() == io::ErrorKind::NotFound => {
                debug!("No config at {:?}, using defaults", path.as_ref());
                Ok(Self::default())
            }
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env::temp_dir, process};

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: FeedConfig =
            serde_json::from_str(r#"{ "separator_labels": { "older": "Earlier" } }"#).unwrap();

        assert_eq!(config.prefetch_pages, 1);
        assert_eq!(config.event_buffer, 16);
        assert_eq!(config.separator_labels.today, "Today");
        assert_eq!(config.separator_labels.older, "Earlier");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let path = temp_dir().join(format!("nmedia-feed-config-{}.json", process::id()));
        tokio::fs::write(&path, r#"{ "prefetch_pages": 3 }"#)
            .await
            .unwrap();

        let config = FeedConfig::load(&path).await.unwrap();
        tokio::fs::remove_file(&path).await.unwrap();

        assert_eq!(config.prefetch_pages, 3);
    }

    #[tokio::test]
    async fn test_missing_file_uses_defaults() {
        let path = temp_dir().join("nmedia-feed-config-that-does-not-exist.json");

        assert!(matches!(
            FeedConfig::load(&path).await,
            Err(ConfigError::ReadFile(_))
        ));
        assert_eq!(
            FeedConfig::load_or_default(&path).await.unwrap(),
            FeedConfig::default()
        );
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let path = temp_dir().join(format!("nmedia-feed-bad-config-{}.json", process::id()));
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = FeedConfig::load_or_default(&path).await;
        tokio::fs::remove_file(&path).await.unwrap();

        assert!(matches!(result, Err(ConfigError::Json(_))));
    }
}
