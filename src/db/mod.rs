//! Document persistence
//!
//! Records are stored as JSON documents grouped into collections. The
//! [`DocumentStore`] trait is the narrow seam the services depend on:
//! insert, list newest first, and a shallow patch by id.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

use crate::models::{BoardRecord, FeedbackRecord, GeneratedImageRecord};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Boards,
    Images,
    Feedback,
}

impl Collection {
    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Boards => "vision_boards",
            Collection::Images => "generated_images",
            Collection::Feedback => "feedback",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> Result<()>;

    /// All documents in `collection`, most recently inserted first.
    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>>;

    /// Merge the top-level fields of `patch` into the stored document.
    /// Returns `false` when no document has that id.
    async fn update_by_id(&self, collection: Collection, id: Uuid, patch: Value) -> Result<bool>;
}

/// Shallow merge used by every store implementation.
pub(crate) fn merge_patch(document: &mut Value, patch: Value) -> Result<()> {
    let (Some(target), Value::Object(fields)) = (document.as_object_mut(), patch) else {
        return Err(Error::Invariant(
            "document patches must be JSON objects".to_string(),
        ));
    };
    for (key, value) in fields {
        target.insert(key, value);
    }
    Ok(())
}

/// A record type that lives in one collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> Uuid;
}

impl Document for BoardRecord {
    const COLLECTION: Collection = Collection::Boards;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for GeneratedImageRecord {
    const COLLECTION: Collection = Collection::Images;

    fn id(&self) -> Uuid {
        self.id
    }
}

impl Document for FeedbackRecord {
    const COLLECTION: Collection = Collection::Feedback;

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Typed view over one collection of a [`DocumentStore`].
pub struct Repository<T> {
    store: Arc<dyn DocumentStore>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            _record: PhantomData,
        }
    }
}

impl<T: Document> Repository<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            _record: PhantomData,
        }
    }

    pub async fn insert(&self, record: &T) -> Result<()> {
        self.store
            .insert(T::COLLECTION, record.id(), serde_json::to_value(record)?)
            .await
    }

    pub async fn find_all(&self) -> Result<Vec<T>> {
        self.store
            .find_all(T::COLLECTION)
            .await?
            .into_iter()
            .map(|document| serde_json::from_value(document).map_err(Error::from))
            .collect()
    }

    pub async fn update_by_id(&self, id: Uuid, patch: Value) -> Result<bool> {
        self.store.update_by_id(T::COLLECTION, id, patch).await
    }

    /// Point the record at its durable copy.
    pub async fn mark_relocated(&self, id: Uuid, signed_url: &str) -> Result<bool> {
        self.update_by_id(
            id,
            json!({
                "imageUrl": signed_url,
                "isRelocated": true,
                "updatedAt": Utc::now(),
            }),
        )
        .await
    }
}
