use async_trait::async_trait;
use cubby_core::{Result, SaveOutcome, ShortKey, StoreError, UrlRecord, UrlRepository};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    original_url: String,
    owner_id: String,
}

/// In-memory implementation of the repository contract.
///
/// A reader/writer lock guards the map and is never held across an await
/// point. Saving a key that already exists overwrites the previous value
/// and still reports [`SaveOutcome::Created`]: duplicate detection is the
/// business of backends that persist, and this one exists for tests and
/// throwaway runs. Nothing here survives the process, so there is no
/// soft-delete state and no record is ever reported as deleted.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryRepository {
    /// Creates an empty in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UrlRepository for MemoryRepository {
    async fn ping(&self) -> Result<()> {
        let _entries = self.entries.read().await;
        Ok(())
    }

    async fn save(
        &self,
        key: &ShortKey,
        original_url: &str,
        owner_id: &str,
    ) -> Result<SaveOutcome> {
        let entry = Entry {
            original_url: original_url.to_owned(),
            owner_id: owner_id.to_owned(),
        };
        self.entries
            .write()
            .await
            .insert(key.as_str().to_owned(), entry);
        Ok(SaveOutcome::Created)
    }

    async fn get(&self, key: &ShortKey) -> Result<UrlRecord> {
        let entries = self.entries.read().await;

        let Some(entry) = entries.get(key.as_str()) else {
            return Err(StoreError::NotFound(key.to_string()));
        };

        Ok(UrlRecord {
            short_key: key.clone(),
            original_url: entry.original_url.clone(),
            owner_id: entry.owner_id.clone(),
            deleted: false,
        })
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
