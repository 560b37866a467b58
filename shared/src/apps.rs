use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A downloadable app listed on the apps page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub logo_url: String,
    pub download_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /api/apps`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewApp {
    pub name: Option<String>,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub download_url: Option<String>,
}
