use super::{merge_patch, Collection, DocumentStore};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-process store, used by tests and as a scratch backend.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<Collection, Vec<(Uuid, Value)>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: Collection, id: Uuid, document: Value) -> Result<()> {
        self.collections
            .lock()
            .await
            .entry(collection)
            .or_default()
            .push((id, document));
        Ok(())
    }

    async fn find_all(&self, collection: Collection) -> Result<Vec<Value>> {
        Ok(self
            .collections
            .lock()
            .await
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .rev()
                    .map(|(_, document)| document.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update_by_id(&self, collection: Collection, id: Uuid, patch: Value) -> Result<bool> {
        let mut collections = self.collections.lock().await;
        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|documents| documents.iter_mut().find(|(doc_id, _)| *doc_id == id))
            .map(|(_, document)| document)
        else {
            return Ok(false);
        };
        merge_patch(document, patch)?;
        Ok(true)
    }
}
