use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A labelled link shown under a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedLink {
    pub label: String,
    pub url: String,
}

/// A video in the archive, as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub youtube_url: String,
    pub youtube_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    #[serde(default)]
    pub related_links: Vec<RelatedLink>,
    #[serde(default = "default_public")]
    pub is_public: bool,
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/videos`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVideo {
    pub youtube_url: Option<String>,
    pub related_links: Option<Vec<RelatedLink>>,
    #[serde(default = "default_public")]
    pub is_public: bool,
}

fn default_public() -> bool {
    true
}
