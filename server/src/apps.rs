use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use vidshelf_shared::{
    api::{Created, DeleteRequest, Message},
    apps::{App, NewApp},
};

use crate::{
    auth::Admin,
    error::ApiError,
    server::Server,
    store::{to_fields, Order, Query},
};

pub const APPS: &str = "apps";

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn list_handler(State(server): State<Arc<Server>>) -> Result<Json<Vec<App>>, ApiError> {
    let docs = server
        .store
        .query(APPS, &Query::new().order_by("createdAt", Order::Descending))
        .await
        .map_err(ApiError::failed("Failed to fetch apps."))?;

    let apps: Vec<App> = docs
        .into_iter()
        .filter_map(|doc| match doc.decode() {
            Ok(app) => Some(app),
            Err(err) => {
                warn!(%err, "Skipping unreadable app");
                None
            }
        })
        .collect();
    Ok(Json(apps))
}

pub async fn create_handler(
    _admin: Admin,
    State(server): State<Arc<Server>>,
    body: Result<Json<NewApp>, JsonRejection>,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    let Json(new_app) = body?;

    let (Some(name), Some(logo_url), Some(download_url)) = (
        required(new_app.name),
        required(new_app.logo_url),
        required(new_app.download_url),
    ) else {
        return Err(ApiError::BadRequest(
            "App name, logo URL, and download URL are required.".to_owned(),
        ));
    };

    let fields = to_fields(&json!({
        "name": name,
        "description": new_app.description.unwrap_or_default(),
        "logoUrl": logo_url,
        "downloadUrl": download_url,
        "createdAt": Utc::now(),
    }))
    .map_err(ApiError::internal("Failed to add app."))?;

    let id = server
        .store
        .add(APPS, fields)
        .await
        .map_err(ApiError::internal("Failed to add app."))?;

    info!(%id, %name, "Added app");
    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "App added successfully.".to_owned(),
            id,
        }),
    ))
}

pub async fn delete_handler(
    _admin: Admin,
    State(server): State<Arc<Server>>,
    body: Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Json(request) = body?;
    let id = required(request.id)
        .ok_or_else(|| ApiError::BadRequest("App ID is required.".to_owned()))?;

    let existed = server
        .store
        .delete(APPS, &id)
        .await
        .map_err(ApiError::internal("Failed to delete app."))?;
    if !existed {
        return Err(ApiError::NotFound("App not found."));
    }

    info!(%id, "Deleted app");
    Ok(Json(Message::new("App deleted successfully.")))
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::server::testing::{admin_cookie, body_json, request, TestServer};

    fn notes() -> serde_json::Value {
        json!({
            "name": "Notes",
            "logoUrl": "https://example.com/notes.png",
            "downloadUrl": "https://example.com/notes.apk",
        })
    }

    #[tokio::test]
    async fn create_list_delete() {
        let server = TestServer::new();
        let cookie = admin_cookie(&server);

        let response = server
            .send(request(Method::POST, "/api/apps", Some(&cookie), Some(notes())))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_owned();

        let response = server
            .send(request(Method::GET, "/api/apps", None, None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let apps: Vec<App> = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].id, id);
        assert_eq!(apps[0].name, "Notes");
        assert_eq!(apps[0].description, "");
        assert_eq!(apps[0].download_url, "https://example.com/notes.apk");

        let response = server
            .send(request(
                Method::DELETE,
                "/api/apps",
                Some(&cookie),
                Some(json!({ "id": id })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({ "message": "App deleted successfully." })
        );

        let response = server
            .send(request(
                Method::DELETE,
                "/api/apps",
                Some(&cookie),
                Some(json!({ "id": id })),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["message"], "App not found.");
    }

    #[tokio::test]
    async fn create_requires_all_links() {
        let server = TestServer::new();
        let cookie = admin_cookie(&server);
        let mut body = notes();
        body["logoUrl"] = json!("");

        let response = server
            .send(request(Method::POST, "/api/apps", Some(&cookie), Some(body)))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["message"],
            "App name, logo URL, and download URL are required."
        );
    }

    #[tokio::test]
    async fn writes_require_admin() {
        let server = TestServer::new();
        let response = server
            .send(request(Method::POST, "/api/apps", None, Some(notes())))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = server
            .send(request(Method::DELETE, "/api/apps", None, Some(json!({ "id": "x" }))))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn delete_requires_an_id() {
        let server = TestServer::new();
        let cookie = admin_cookie(&server);
        let response = server
            .send(request(Method::DELETE, "/api/apps", Some(&cookie), Some(json!({ "id": "" }))))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["message"], "App ID is required.");
    }
}
