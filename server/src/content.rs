use std::{path::Path, sync::Arc};

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    config::{load_json, ConfigError},
    server::Server,
};

/// A profile link shown in the footer and on the socials page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLink {
    pub name: String,
    pub url: String,
    pub handle: String,
    #[serde(default)]
    pub icon: String,
}

/// Channel details and links, edited by hand in the content file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub channel_info: serde_json::Value,
    #[serde(default)]
    pub socials: Vec<SocialLink>,
    #[serde(default)]
    pub authors: Vec<SocialLink>,
}

impl Content {
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(file) = file else {
            return Ok(Self::default());
        };
        let mut content: Content = load_json(file)?;
        for social in &mut content.socials {
            social.icon = social_icon(&social.name).to_owned();
        }
        for author in &mut content.authors {
            author.icon = "instagram".to_owned();
        }
        Ok(content)
    }
}

fn social_icon(name: &str) -> &'static str {
    match name {
        "YouTube" => "youtube",
        "GitHub" => "github",
        "Telegram" | "Telegram Group" | "Telegram Channel" => "send",
        "WhatsApp Channel" => "message-circle",
        "Google Play Store" => "smartphone",
        _ => "instagram",
    }
}

pub async fn content_handler(State(server): State<Arc<Server>>) -> Json<Content> {
    Json(server.content.clone())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn attaches_icons_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("content.json");
        std::fs::write(
            &file,
            r#"{
                "channelInfo": { "name": "Channel" },
                "socials": [
                    { "name": "YouTube", "url": "https://youtube.com/@c", "handle": "@c" },
                    { "name": "Telegram Group", "url": "https://t.me/c", "handle": "c" },
                    { "name": "Mastodon", "url": "https://m.social/@c", "handle": "@c" }
                ],
                "authors": [
                    { "name": "someone", "url": "https://instagram.com/someone", "handle": "someone" }
                ]
            }"#,
        )
        .unwrap();

        let content = Content::load(Some(&file)).unwrap();
        let icons: Vec<&str> = content.socials.iter().map(|s| s.icon.as_str()).collect();
        assert_eq!(icons, vec!["youtube", "send", "instagram"]);
        assert_eq!(content.authors[0].icon, "instagram");
        assert_eq!(content.channel_info["name"], "Channel");
    }

    #[test]
    fn no_file_means_empty_content() {
        let content = Content::load(None).unwrap();
        assert!(content.socials.is_empty());
        assert!(content.channel_info.is_null());
    }
}
