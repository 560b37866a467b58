use std::fmt::Display;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;
use vidshelf_shared::api::Message;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("{message}")]
    Internal {
        message: &'static str,
        error: Option<String>,
    },
}

impl ApiError {
    /// Log `err` and turn it into a 500 that hides the cause.
    pub fn failed<E: Display>(message: &'static str) -> impl FnOnce(E) -> Self {
        move |err| {
            error!(%err, "{message}");
            ApiError::Internal {
                message,
                error: None,
            }
        }
    }

    /// Log `err` and turn it into a 500 that reports the cause to the admin.
    pub fn internal<E: Display>(message: &'static str) -> impl FnOnce(E) -> Self {
        move |err| {
            error!(%err, "{message}");
            ApiError::Internal {
                message,
                error: Some(err.to_string()),
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Internal { message, error } => Message {
                message: message.to_owned(),
                error,
            },
            other => Message::new(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
