//! Admin sessions: password login, a signed token in an http-only cookie,
//! and extractors that check it on each request.

use std::sync::Arc;

use axum::{
    async_trait,
    body::{boxed, Body},
    extract::{rejection::JsonRejection, FromRequestParts, State},
    headers::Cookie,
    http::{header::SET_COOKIE, request::Parts, HeaderMap, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json, TypedHeader,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, info, warn};
use vidshelf_shared::{
    api::{AuthStatus, LoginRequest, LoginResponse},
    cookies::{ADMIN_SESSION_COOKIE, ADMIN_SESSION_MAX_AGE},
};

use crate::{error::ApiError, server::Server};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    is_admin: bool,
    iat: i64,
    exp: i64,
}

/// The admin password and the key session tokens are signed with.
pub struct SessionKeys {
    admin_password: String,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn new(admin_password: impl Into<String>, jwt_secret: &str) -> Self {
        Self {
            admin_password: admin_password.into(),
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
        }
    }

    fn password_matches(&self, password: &str) -> bool {
        self.admin_password == password
    }

    /// Sign a token granting admin rights for one session lifetime.
    pub fn issue(&self) -> Result<String, jsonwebtoken::errors::Error> {
        let iat = Utc::now().timestamp();
        let claims = Claims {
            is_admin: true,
            iat,
            exp: iat + ADMIN_SESSION_MAX_AGE,
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// True only for an unexpired token signed with our key that claims admin.
    pub fn verify(&self, token: &str) -> bool {
        match decode::<Claims>(token, &self.decoding, &Validation::default()) {
            Ok(data) => data.claims.is_admin,
            Err(err) => {
                info!(%err, "Admin verification failed");
                false
            }
        }
    }
}

async fn session_is_admin(parts: &mut Parts, server: &Arc<Server>) -> bool {
    let cookies = TypedHeader::<Cookie>::from_request_parts(parts, server)
        .await
        .ok();
    match cookies.as_ref().and_then(|c| c.get(ADMIN_SESSION_COOKIE)) {
        Some(token) => server.sessions.verify(token),
        None => false,
    }
}

/// Extracts only for requests carrying a valid admin session; everyone else
/// gets a 401.
pub struct Admin;

#[async_trait]
impl FromRequestParts<Arc<Server>> for Admin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &Arc<Server>,
    ) -> Result<Self, Self::Rejection> {
        if session_is_admin(parts, server).await {
            Ok(Admin)
        } else {
            Err(ApiError::Unauthorized)
        }
    }
}

/// Whoever is asking, admin or not.
pub struct Viewer {
    pub is_admin: bool,
}

#[async_trait]
impl FromRequestParts<Arc<Server>> for Viewer {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        server: &Arc<Server>,
    ) -> Result<Self, Self::Rejection> {
        Ok(Viewer {
            is_admin: session_is_admin(parts, server).await,
        })
    }
}

fn session_cookie(value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{ADMIN_SESSION_COOKIE}={value}; HttpOnly; SameSite=Strict; Path=/; Max-Age={max_age}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn cookie_headers(cookie: &str) -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    let value = HeaderValue::from_str(cookie)
        .map_err(ApiError::failed("An internal server error occurred."))?;
    headers.insert(SET_COOKIE, value);
    Ok(headers)
}

pub async fn login_handler(
    State(server): State<Arc<Server>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;

    if !server.sessions.password_matches(&request.password) {
        warn!("Rejected admin login");
        let reply = LoginResponse {
            success: false,
            message: Some("Invalid password.".to_owned()),
        };
        return Ok((StatusCode::UNAUTHORIZED, Json(reply)).into_response());
    }

    let token = server
        .sessions
        .issue()
        .map_err(ApiError::failed("An internal server error occurred."))?;
    let headers = cookie_headers(&session_cookie(
        &token,
        ADMIN_SESSION_MAX_AGE,
        server.config.secure_cookies,
    ))?;

    info!("Admin logged in");
    let reply = LoginResponse {
        success: true,
        message: None,
    };
    Ok((headers, Json(reply)).into_response())
}

pub async fn logout_handler(State(server): State<Arc<Server>>) -> Result<Response, ApiError> {
    let headers = cookie_headers(&session_cookie("", 0, server.config.secure_cookies))?;
    let reply = LoginResponse {
        success: true,
        message: Some("Logged out successfully.".to_owned()),
    };
    Ok((headers, Json(reply)).into_response())
}

pub async fn status_handler(viewer: Viewer) -> Json<AuthStatus> {
    Json(AuthStatus {
        is_authenticated: viewer.is_admin,
    })
}

/// Whether `path` names the admin panel or anything beneath it, spelled any
/// way the static file service would still resolve into `admin/`.
fn is_admin_path(path: &str) -> bool {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    decoded
        .split(['/', '\\'])
        .find(|segment| !segment.is_empty() && *segment != ".")
        .map_or(false, |segment| segment.eq_ignore_ascii_case("admin"))
}

/// Send visitors asking for the admin panel to the login page. Applies to
/// every route, static files included.
pub async fn admin_guard(viewer: Viewer, request: Request<Body>, next: Next<Body>) -> Response {
    if !viewer.is_admin && is_admin_path(request.uri().path()) {
        debug!(path = request.uri().path(), "Redirecting to login");
        return Redirect::to("/login").into_response();
    }
    next.run(request).await
}

/// The admin panel's entry page. Only reachable through [`admin_guard`].
pub async fn admin_page_handler(
    State(server): State<Arc<Server>>,
    request: Request<Body>,
) -> Response {
    let page = server.config.serve_dir.join("admin").join("index.html");
    match ServeFile::new(page).oneshot(request).await {
        Ok(response) => response.map(boxed),
        Err(never) => match never {},
    }
}
