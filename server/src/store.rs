//! A small document store: named collections of JSON documents.
//!
//! Collections are loaded lazily on first use. With a root directory each
//! collection lives in `<root>/<name>.json` and is rewritten after every
//! mutation; without one everything stays in memory.

use std::{
    cmp::Ordering,
    collections::{hash_map::Entry, BTreeMap, HashMap},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use chrono::{DateTime, FixedOffset};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub type Fields = Map<String, Value>;

type Collection = BTreeMap<String, Fields>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("collection file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("document cannot be stored: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("document {collection}/{id} has unexpected shape: {source}")]
    Decode {
        collection: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Serialize a record into document fields. Only JSON objects can be stored.
pub fn to_fields<T: Serialize>(record: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(record).map_err(StoreError::Encode)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::Encode(serde::ser::Error::custom(
            "documents must be JSON objects",
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub collection: String,
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Deserialize the fields, with the document id available as `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_owned(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|source| StoreError::Decode {
            collection: self.collection.clone(),
            id: self.id.clone(),
            source,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
}

/// Equality filters plus an optional ordering on a single field.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order: Option<(String, Order)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_owned(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, order: Order) -> Self {
        self.order = Some((field.to_owned(), order));
        self
    }

    fn matches(&self, fields: &Fields) -> bool {
        self.filters
            .iter()
            .all(|(field, value)| fields.get(field) == Some(value))
    }
}

#[derive(Debug)]
pub struct DocumentStore {
    root: Option<PathBuf>,
    collections: Mutex<HashMap<String, Collection>>,
}

impl DocumentStore {
    pub fn in_memory() -> Self {
        Self {
            root: None,
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub fn persistent(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            collections: Mutex::new(HashMap::new()),
        }
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = self.load(&mut collections, collection).await?;
        Ok(docs.get(id).map(|fields| Document {
            collection: collection.to_owned(),
            id: id.to_owned(),
            fields: fields.clone(),
        }))
    }

    pub async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = self.load(&mut collections, collection).await?;

        let mut found: Vec<Document> = docs
            .iter()
            .filter(|(_, fields)| query.matches(fields))
            .map(|(id, fields)| Document {
                collection: collection.to_owned(),
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect();

        if let Some((field, order)) = &query.order {
            found.sort_by(|a, b| {
                let ordering = compare_values(a.fields.get(field), b.fields.get(field));
                match order {
                    Order::Ascending => ordering,
                    Order::Descending => ordering.reverse(),
                }
            });
        }
        Ok(found)
    }

    /// Store a new document under a generated id and return the id.
    pub async fn add(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.set(collection, &id, fields).await?;
        Ok(id)
    }

    /// Create or replace the document `id`.
    pub async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = self.load(&mut collections, collection).await?;
        self.commit(collection, docs, id, Some(fields)).await
    }

    /// Remove the document `id`, reporting whether it existed.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = self.load(&mut collections, collection).await?;
        if !docs.contains_key(id) {
            return Ok(false);
        }
        self.commit(collection, docs, id, None).await?;
        Ok(true)
    }

    /// Read-modify-write a single document while holding the store lock.
    ///
    /// The closure sees the current fields (`None` when absent) and may
    /// replace or clear them; the result is written back only if it changed.
    pub async fn transaction<R>(
        &self,
        collection: &str,
        id: &str,
        update: impl FnOnce(&mut Option<Fields>) -> R,
    ) -> Result<R, StoreError> {
        let mut collections = self.collections.lock().await;
        let docs = self.load(&mut collections, collection).await?;

        let before = docs.get(id).cloned();
        let mut current = before.clone();
        let out = update(&mut current);
        if current != before {
            self.commit(collection, docs, id, current).await?;
        }
        Ok(out)
    }

    async fn load<'a>(
        &self,
        collections: &'a mut HashMap<String, Collection>,
        name: &str,
    ) -> Result<&'a mut Collection, StoreError> {
        match collections.entry(name.to_owned()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let docs = match &self.root {
                    Some(root) => {
                        debug!(collection = name, "Loading collection");
                        read_collection(&collection_path(root, name)).await?
                    }
                    None => Collection::new(),
                };
                Ok(entry.insert(docs))
            }
        }
    }

    /// Apply a change to one document and persist the collection, undoing the
    /// change if it could not be written.
    async fn commit(
        &self,
        name: &str,
        docs: &mut Collection,
        id: &str,
        fields: Option<Fields>,
    ) -> Result<(), StoreError> {
        let previous = match fields {
            Some(fields) => docs.insert(id.to_owned(), fields),
            None => docs.remove(id),
        };

        let Some(root) = &self.root else {
            return Ok(());
        };

        if let Err(err) = write_collection(root, name, docs).await {
            warn!(collection = name, id, %err, "Failed to persist collection, reverting");
            match previous {
                Some(fields) => docs.insert(id.to_owned(), fields),
                None => docs.remove(id),
            };
            return Err(err);
        }
        debug!(collection = name, id, "Flushed");
        Ok(())
    }
}

fn collection_path(root: &Path, name: &str) -> PathBuf {
    root.join(format!("{name}.json"))
}

async fn read_collection(path: &Path) -> Result<Collection, StoreError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: path.to_owned(),
            source,
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(Collection::new()),
        Err(source) => Err(StoreError::Io {
            path: path.to_owned(),
            source,
        }),
    }
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError {
    let path = path.to_owned();
    move |source| StoreError::Io { path, source }
}

async fn write_collection(root: &Path, name: &str, docs: &Collection) -> Result<(), StoreError> {
    tokio::fs::create_dir_all(root).await.map_err(io_err(root))?;

    let path = collection_path(root, name);
    let tmp = root.join(format!(".{name}.json.tmp"));
    let bytes = serde_json::to_vec_pretty(docs).map_err(|source| StoreError::Corrupt {
        path: path.clone(),
        source,
    })?;
    tokio::fs::write(&tmp, bytes).await.map_err(io_err(&tmp))?;
    tokio::fs::rename(&tmp, &path).await.map_err(io_err(&path))
}

/// Order values the way a document database does: by type first, then
/// numbers numerically and strings lexically. Strings holding RFC 3339
/// timestamps sort before other strings, chronologically among themselves.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    fn timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(s).ok()
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => match (timestamp(a), timestamp(b)) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        },
        (Some(a), Some(b)) => rank(a).cmp(&rank(b)),
    }
}
