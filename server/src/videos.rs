use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vidshelf_shared::{
    api::{Created, DeleteRequest, Message},
    videos::{NewVideo, RelatedLink, Video},
    youtube::{self, PLACEHOLDER_THUMBNAIL},
};

use crate::{
    auth::{Admin, Viewer},
    error::ApiError,
    oembed::{OEmbedError, VideoDetails},
    server::Server,
    store::{to_fields, Document, DocumentStore, Order, Query},
};

pub const VIDEOS: &str = "videos";

/// A video document as stored. Older documents carry only the URL and
/// links, so everything fetched from YouTube is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredVideo {
    #[serde(default, skip_serializing)]
    id: String,
    youtube_url: String,
    youtube_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    thumbnail_url: Option<String>,
    #[serde(default)]
    related_links: Vec<RelatedLink>,
    #[serde(default)]
    is_public: bool,
    created_at: Option<DateTime<Utc>>,
}

fn decode_all(docs: Vec<Document>) -> Vec<StoredVideo> {
    docs.into_iter()
        .filter_map(|doc| match doc.decode() {
            Ok(video) => Some(video),
            Err(err) => {
                warn!(%err, "Skipping unreadable video");
                None
            }
        })
        .collect()
}

/// Record what YouTube told us about a legacy document so later reads skip
/// the lookup. Documents that gained a title in the meantime are left alone.
async fn remember(store: &DocumentStore, id: &str, youtube_id: &str, found: &VideoDetails) {
    let result = store
        .transaction(VIDEOS, id, |doc| {
            let Some(fields) = doc else { return };
            if fields.get("title").map_or(false, |title| !title.is_null()) {
                return;
            }
            fields.insert("youtubeId".to_owned(), youtube_id.into());
            fields.insert("title".to_owned(), found.title.clone().into());
            fields.insert("description".to_owned(), found.title.clone().into());
            fields.insert("thumbnailUrl".to_owned(), found.thumbnail_url.clone().into());
        })
        .await;
    if let Err(err) = result {
        warn!(%id, %err, "Could not save video details");
    }
}

/// Fill in whatever a stored video is missing, asking YouTube when the title
/// was never recorded and saving the answer. Lookups that fail still produce
/// a displayable video.
async fn complete(server: &Server, stored: StoredVideo) -> Video {
    let youtube_id = stored
        .youtube_id
        .clone()
        .or_else(|| youtube::youtube_id(&stored.youtube_url));

    let (youtube_id, title, description, thumbnail_url) = match (youtube_id, stored.title) {
        (Some(id), Some(title)) => {
            let description = stored.description.unwrap_or_else(|| title.clone());
            let thumbnail = stored
                .thumbnail_url
                .unwrap_or_else(|| youtube::max_res_thumbnail(&id));
            (id, title, description, thumbnail)
        }
        (Some(id), None) => match server.details.fetch(&id).await {
            Ok(found) => {
                if !stored.id.is_empty() {
                    remember(&server.store, &stored.id, &id, &found).await;
                }
                (id, found.title.clone(), found.title, found.thumbnail_url)
            }
            Err(err) => {
                warn!(youtube_id = %id, %err, "Could not load video details");
                let description = match err {
                    OEmbedError::Status(_) => {
                        "Could not load video details. The video may be private or have embedding disabled."
                    }
                    OEmbedError::Request(_) => "An error occurred while trying to load video details.",
                };
                let thumbnail = youtube::max_res_thumbnail(&id);
                (
                    id,
                    "Video Title Unavailable".to_owned(),
                    description.to_owned(),
                    thumbnail,
                )
            }
        },
        (None, _) => {
            warn!(url = %stored.youtube_url, "Invalid YouTube URL, missing video ID");
            (
                "invalid-video-id".to_owned(),
                "Invalid YouTube URL".to_owned(),
                "The provided YouTube URL could not be parsed. Please check the format.".to_owned(),
                PLACEHOLDER_THUMBNAIL.to_owned(),
            )
        }
    };

    Video {
        id: stored.id,
        youtube_url: stored.youtube_url,
        youtube_id,
        title,
        description,
        thumbnail_url,
        related_links: stored.related_links,
        is_public: stored.is_public,
        created_at: stored.created_at,
    }
}

/// Newest first. Visitors only see public videos.
pub async fn list_handler(
    viewer: Viewer,
    State(server): State<Arc<Server>>,
) -> Result<Json<Vec<Video>>, ApiError> {
    let mut query = Query::new();
    if !viewer.is_admin {
        query = query.where_eq("isPublic", true);
    }
    let query = query.order_by("createdAt", Order::Descending);

    let docs = server
        .store
        .query(VIDEOS, &query)
        .await
        .map_err(ApiError::failed("Failed to fetch videos."))?;

    let server: &Server = &server;
    let videos = join_all(
        decode_all(docs)
            .into_iter()
            .map(|stored| complete(server, stored)),
    )
    .await;
    Ok(Json(videos))
}

pub async fn get_handler(
    Path(id): Path<String>,
    viewer: Viewer,
    State(server): State<Arc<Server>>,
) -> Result<Json<Video>, ApiError> {
    let doc = server
        .store
        .get(VIDEOS, &id)
        .await
        .map_err(ApiError::failed("Failed to fetch videos."))?
        .ok_or(ApiError::NotFound("Video not found."))?;
    let stored: StoredVideo = doc
        .decode()
        .map_err(ApiError::failed("Failed to fetch videos."))?;

    if !stored.is_public && !viewer.is_admin {
        return Err(ApiError::NotFound("Video not found."));
    }
    Ok(Json(complete(&server, stored).await))
}

pub async fn create_handler(
    _admin: Admin,
    State(server): State<Arc<Server>>,
    body: Result<Json<NewVideo>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let Json(new_video) = body?;

    let youtube_url = new_video
        .youtube_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::BadRequest("YouTube URL is required.".to_owned()))?;
    let youtube_id = youtube::youtube_id(&youtube_url)
        .ok_or_else(|| ApiError::BadRequest("Invalid YouTube URL.".to_owned()))?;

    let existing = server
        .store
        .query(VIDEOS, &Query::new().where_eq("youtubeId", youtube_id.as_str()))
        .await
        .map_err(ApiError::internal("Failed to add video."))?;
    if !existing.is_empty() {
        return Err(ApiError::Conflict("Video with this ID already exists."));
    }

    let details = server
        .details
        .fetch(&youtube_id)
        .await
        .map_err(ApiError::internal("Failed to add video."))?;

    let stored = StoredVideo {
        id: String::new(),
        youtube_url,
        youtube_id: Some(youtube_id.clone()),
        title: Some(details.title.clone()),
        description: Some(details.title),
        thumbnail_url: Some(details.thumbnail_url),
        related_links: new_video.related_links.unwrap_or_default(),
        is_public: new_video.is_public,
        created_at: Some(Utc::now()),
    };
    let fields = to_fields(&stored).map_err(ApiError::internal("Failed to add video."))?;
    let id = server
        .store
        .add(VIDEOS, fields)
        .await
        .map_err(ApiError::internal("Failed to add video."))?;

    info!(%id, %youtube_id, "Added video");
    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "Video added successfully.".to_owned(),
            id,
        }),
    ))
}

/// Deleting a video that is already gone still succeeds.
pub async fn delete_handler(
    _admin: Admin,
    State(server): State<Arc<Server>>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Json(request) = body?;
    let id = request
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Video ID is required.".to_owned()))?;

    let existed = server
        .store
        .delete(VIDEOS, &id)
        .await
        .map_err(ApiError::internal("Failed to delete video."))?;

    info!(%id, existed, "Deleted video");
    Ok(Json(Message::new("Video deleted successfully.")))
}
