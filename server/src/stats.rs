use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::Value;
use tracing::debug;
use vidshelf_shared::api::{Success, VisitCount};

use crate::{auth::Admin, error::ApiError, server::Server, store::Fields};

const STATS: &str = "stats";
const VISITS: &str = "visits";

fn count_of(doc: &Option<Fields>) -> u64 {
    doc.as_ref()
        .and_then(|fields| fields.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Count a page view. Public, since every visitor's browser reports itself.
pub async fn record_visit_handler(
    State(server): State<Arc<Server>>,
) -> Result<Json<Success>, ApiError> {
    let count = server
        .store
        .transaction(STATS, VISITS, |doc| {
            let count = count_of(doc) + 1;
            doc.get_or_insert_with(Fields::new)
                .insert("count".to_owned(), count.into());
            count
        })
        .await
        .map_err(ApiError::failed("Failed to increment visitor count."))?;

    debug!(count, "Recorded visit");
    Ok(Json(Success { success: true }))
}

pub async fn count_handler(
    _admin: Admin,
    State(server): State<Arc<Server>>,
) -> Result<Json<VisitCount>, ApiError> {
    let count = server
        .store
        .transaction(STATS, VISITS, |doc| {
            if doc.is_none() {
                let mut fields = Fields::new();
                fields.insert("count".to_owned(), 0.into());
                *doc = Some(fields);
            }
            count_of(doc)
        })
        .await
        .map_err(ApiError::failed("Failed to fetch visitor stats."))?;

    Ok(Json(VisitCount { count }))
}
