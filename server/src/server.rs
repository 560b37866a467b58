use std::{sync::Arc, time::Duration};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use thiserror::Error;
use tracing::info;

use crate::{
    apps,
    auth::{self, SessionKeys},
    config::{ConfigError, ServerConfig},
    content::{self, Content},
    oembed::{VideoDetailsSource, YouTubeOEmbed},
    stats,
    store::DocumentStore,
    videos,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build the YouTube client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct Server {
    pub(crate) config: ServerConfig,
    pub(crate) store: DocumentStore,
    pub(crate) sessions: SessionKeys,
    pub(crate) details: Box<dyn VideoDetailsSource>,
    pub(crate) content: Content,
}

impl Server {
    pub fn new(config: ServerConfig, sessions: SessionKeys) -> Result<Self, ServerError> {
        let store = match &config.documents_dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Persisting documents");
                DocumentStore::persistent(dir)
            }
            None => {
                info!("No documents_dir configured, keeping documents in memory");
                DocumentStore::in_memory()
            }
        };
        let content = Content::load(config.content_file.as_deref())?;
        let details = Box::new(YouTubeOEmbed::new(
            config.oembed_endpoint.clone(),
            Duration::from_secs(config.oembed_timeout_secs),
        )?);

        Ok(Self {
            config,
            store,
            sessions,
            details,
            content,
        })
    }
}

pub fn router(server: Arc<Server>) -> Router {
    let serve_dir = server.config.serve_dir.clone();
    let pages =
        ServeDir::new(&serve_dir).not_found_service(ServeFile::new(serve_dir.join("404.html")));

    Router::new()
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/status", get(auth::status_handler))
        .route(
            "/api/videos",
            get(videos::list_handler)
                .post(videos::create_handler)
                .delete(videos::delete_handler),
        )
        .route("/api/videos/:id", get(videos::get_handler))
        .route(
            "/api/apps",
            get(apps::list_handler)
                .post(apps::create_handler)
                .delete(apps::delete_handler),
        )
        .route(
            "/api/stats",
            get(stats::count_handler).post(stats::record_visit_handler),
        )
        .route("/api/content", get(content::content_handler))
        .route("/admin", get(auth::admin_page_handler))
        .fallback_service(pages)
        .layer(middleware::from_fn_with_state(
            server.clone(),
            auth::admin_guard,
        ))
        .with_state(server)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub mod testing {
    use std::path::Path;

    use axum::{
        body::Body,
        http::{header::CONTENT_TYPE, header::COOKIE, Method, Request},
        response::Response,
    };
    use tempfile::TempDir;
    use tower::ServiceExt;
    use vidshelf_shared::cookies::ADMIN_SESSION_COOKIE;

    use super::*;
    use crate::oembed::testing::FixedDetails;

    pub const ADMIN_PASSWORD: &str = "hunter2";

    /// A server over an in-memory store with canned video details and a
    /// scratch directory for static pages.
    pub struct TestServer {
        pub server: Arc<Server>,
        pub details: Arc<FixedDetails>,
        router: Router,
        dir: TempDir,
    }

    impl TestServer {
        pub fn new() -> Self {
            Self::with_details(FixedDetails::default())
        }

        pub fn with_details(details: FixedDetails) -> Self {
            let details = Arc::new(details);
            let dir = tempfile::tempdir().unwrap();
            let config = ServerConfig {
                serve_dir: dir.path().to_owned(),
                secure_cookies: false,
                ..ServerConfig::default()
            };
            let server = Arc::new(Server {
                config,
                store: DocumentStore::in_memory(),
                sessions: SessionKeys::new(ADMIN_PASSWORD, "test secret"),
                details: Box::new(details.clone()),
                content: Content::default(),
            });
            Self {
                router: router(server.clone()),
                server,
                details,
                dir,
            }
        }

        pub fn serve_dir(&self) -> &Path {
            self.dir.path()
        }

        pub async fn send(&self, request: Request<Body>) -> Response {
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    pub fn admin_cookie(server: &TestServer) -> String {
        let token = server.server.sessions.issue().unwrap();
        format!("{ADMIN_SESSION_COOKIE}={token}")
    }

    pub fn request(
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(COOKIE, cookie);
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};

    use super::testing::*;

    #[tokio::test]
    async fn serves_static_pages_with_a_not_found_page() {
        let server = TestServer::new();
        std::fs::write(server.serve_dir().join("about.html"), "about us").unwrap();
        std::fs::write(server.serve_dir().join("404.html"), "lost").unwrap();

        let response = server
            .send(request(Method::GET, "/about.html", None, None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = server
            .send(request(Method::GET, "/nowhere", None, None))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();
        assert_eq!(&body[..], b"lost");
    }

    #[tokio::test]
    async fn content_is_public() {
        let server = TestServer::new();
        let response = server
            .send(request(Method::GET, "/api/content", None, None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["socials"], serde_json::json!([]));
    }
}
