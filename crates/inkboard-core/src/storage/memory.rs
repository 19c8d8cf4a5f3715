//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult, encode};
use crate::canvas::Canvas;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
///
/// Records are kept as serialized JSON so a load behaves exactly like one
/// from disk.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw record text, bypassing serialization.
    pub fn insert_raw(&self, id: &str, json: impl Into<String>) -> StorageResult<()> {
        let mut docs = self
            .documents
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        docs.insert(id.to_string(), json.into());
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, canvas: &Canvas) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let json = encode(canvas);
        Box::pin(async move {
            let json = json?;
            let mut docs = self.documents.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            docs.insert(id, json);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Canvas>> {
        let id = id.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            docs.get(&id)
                .map(|json| Canvas::from_json(json))
                .ok_or(StorageError::NotFound(id))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut docs = self.documents.write().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            docs.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let docs = self.documents.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            Ok(docs.keys().cloned().collect())
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(|e| {
                StorageError::Other(format!("Lock error: {}", e))
            })?;
            Ok(docs.contains_key(&id))
        })
    }
}
