use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use vidshelf_shared::youtube;

#[derive(Debug, Error)]
pub enum OEmbedError {
    #[error("Failed to fetch video details from YouTube: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to fetch video details from YouTube: status {0}")]
    Status(reqwest::StatusCode),
}

/// The part of an oEmbed reply the archive keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDetails {
    pub title: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct OEmbedReply {
    title: String,
    thumbnail_url: String,
}

/// Looks up a video's title and thumbnail by its YouTube id.
#[async_trait]
pub trait VideoDetailsSource: Send + Sync {
    async fn fetch(&self, youtube_id: &str) -> Result<VideoDetails, OEmbedError>;
}

pub struct YouTubeOEmbed {
    client: reqwest::Client,
    endpoint: String,
}

impl YouTubeOEmbed {
    /// Lookups that take longer than `timeout` fail with a request error.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl VideoDetailsSource for YouTubeOEmbed {
    async fn fetch(&self, youtube_id: &str) -> Result<VideoDetails, OEmbedError> {
        debug!(youtube_id, "Fetching oEmbed details");
        let watch_url = youtube::watch_url(youtube_id);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("url", watch_url.as_str()), ("format", "json")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OEmbedError::Status(response.status()));
        }

        let reply: OEmbedReply = response.json().await?;
        Ok(VideoDetails {
            title: reply.title,
            thumbnail_url: youtube::upgrade_thumbnail(&reply.thumbnail_url),
        })
    }
}

#[cfg(test)]
pub mod testing {
    use std::{
        collections::{HashMap, HashSet},
        sync::{Arc, Mutex},
    };

    use super::*;

    /// Serves canned details and records which ids were asked for. Unknown
    /// ids fail as YouTube does for private videos; unreachable ones fail
    /// before any reply arrives.
    #[derive(Default)]
    pub struct FixedDetails {
        pub details: HashMap<String, VideoDetails>,
        pub unreachable: HashSet<String>,
        pub requested: Mutex<Vec<String>>,
    }

    impl FixedDetails {
        pub fn with(mut self, youtube_id: &str, title: &str) -> Self {
            self.details.insert(
                youtube_id.to_owned(),
                VideoDetails {
                    title: title.to_owned(),
                    thumbnail_url: youtube::max_res_thumbnail(youtube_id),
                },
            );
            self
        }

        pub fn unreachable(mut self, youtube_id: &str) -> Self {
            self.unreachable.insert(youtube_id.to_owned());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl VideoDetailsSource for FixedDetails {
        async fn fetch(&self, youtube_id: &str) -> Result<VideoDetails, OEmbedError> {
            self.requested.lock().unwrap().push(youtube_id.to_owned());
            if self.unreachable.contains(youtube_id) {
                let err = reqwest::Client::new()
                    .get("not a url")
                    .build()
                    .unwrap_err();
                return Err(OEmbedError::Request(err));
            }
            self.details
                .get(youtube_id)
                .cloned()
                .ok_or(OEmbedError::Status(reqwest::StatusCode::UNAUTHORIZED))
        }
    }

    #[async_trait]
    impl VideoDetailsSource for Arc<FixedDetails> {
        async fn fetch(&self, youtube_id: &str) -> Result<VideoDetails, OEmbedError> {
            self.as_ref().fetch(youtube_id).await
        }
    }
}
