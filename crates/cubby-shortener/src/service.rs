use crate::delete::{DeletePipeline, DeleteQueueSettings};
use cubby_core::{
    DeleteTask, Result, SaveOutcome, ShortKey, StoreError, UrlPair, UrlRecord, UrlRepository,
};
use std::sync::Arc;
use tracing::debug;

/// Capability-aware facade over a storage backend.
///
/// Each optional operation is resolved against the backend once, at
/// construction: the delete pipeline only starts when the backend can
/// soft-delete, batch saves take the transactional path when one exists,
/// and owner listing fails with [`StoreError::Unsupported`] rather than
/// pretending an empty result.
pub struct UrlStore {
    repo: Arc<dyn UrlRepository>,
    pipeline: Option<DeletePipeline>,
}

impl UrlStore {
    /// Wraps `repo` with default delete-queue settings.
    pub fn new(repo: Arc<dyn UrlRepository>) -> Self {
        Self::with_settings(repo, DeleteQueueSettings::default())
    }

    /// Wraps `repo`, tuning the delete queue.
    pub fn with_settings(repo: Arc<dyn UrlRepository>, settings: DeleteQueueSettings) -> Self {
        let pipeline = repo
            .as_soft_deleter()
            .map(|deleter| DeletePipeline::start(deleter, settings));
        if pipeline.is_none() {
            debug!("backend cannot soft-delete, delete queue disabled");
        }

        Self { repo, pipeline }
    }

    /// Checks that the backend is reachable.
    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }

    /// Persists one mapping under an already-derived key.
    pub async fn save(
        &self,
        key: &ShortKey,
        original_url: &str,
        owner_id: &str,
    ) -> Result<SaveOutcome> {
        self.repo.save(key, original_url, owner_id).await
    }

    /// Derives the key for `original_url` and persists the mapping.
    ///
    /// A [`SaveOutcome::Duplicate`] outcome still returns the key: the
    /// mapping exists either way, and the caller may not know whether it
    /// was first.
    pub async fn shorten(
        &self,
        original_url: &str,
        owner_id: &str,
    ) -> Result<(ShortKey, SaveOutcome)> {
        let key = ShortKey::derive(original_url);
        let outcome = self.repo.save(&key, original_url, owner_id).await?;
        Ok((key, outcome))
    }

    /// Resolves a short key. Soft-deleted records answer like absent
    /// ones.
    pub async fn get(&self, key: &ShortKey) -> Result<UrlRecord> {
        self.repo.get(key).await
    }

    /// Persists a batch of already-derived mappings.
    ///
    /// With a batch-capable backend the whole batch is one transaction
    /// and conflicting pairs are skipped. Otherwise the pairs are saved
    /// one by one with no atomicity: an error mid-way leaves the earlier
    /// pairs saved.
    pub async fn save_batch(&self, pairs: &[UrlPair]) -> Result<()> {
        if let Some(saver) = self.repo.as_batch_saver() {
            return saver.save_batch(pairs).await;
        }

        debug!(pairs = pairs.len(), "backend cannot batch-save, saving sequentially");
        for pair in pairs {
            self.repo
                .save(&pair.short_key, &pair.original_url, "")
                .await?;
        }
        Ok(())
    }

    /// Lists every record owned by `owner_id`, including soft-deleted
    /// ones.
    pub async fn list_owned(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        match self.repo.as_owner_index() {
            Some(index) => index.list_owned(owner_id).await,
            None => Err(StoreError::Unsupported("owner listing")),
        }
    }

    /// Queues one soft-delete task for the background flush.
    ///
    /// Rejected up front with [`StoreError::Unsupported`] when the
    /// backend cannot soft-delete; nothing is silently dropped.
    pub async fn enqueue_delete(&self, task: DeleteTask) -> Result<()> {
        let Some(pipeline) = &self.pipeline else {
            return Err(StoreError::Unsupported("soft delete"));
        };
        pipeline.enqueue(task).await
    }

    /// Drains and stops the delete pipeline. Safe to call more than
    /// once; a store without a pipeline returns immediately.
    pub async fn shutdown(&self) {
        if let Some(pipeline) = &self.pipeline {
            pipeline.shutdown().await;
        }
    }

    /// Releases the backend after draining the delete pipeline.
    pub async fn close(&self) -> Result<()> {
        self.shutdown().await;
        self.repo.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cubby_core::{BatchSaver, SoftDeleter};
    use cubby_storage::MemoryRepository;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Backend double with every capability, recording what reaches it.
    #[derive(Clone, Default)]
    struct FakeDb {
        inner: Arc<Mutex<FakeDbState>>,
    }

    #[derive(Default)]
    struct FakeDbState {
        records: HashMap<String, (String, String)>,
        batch_calls: usize,
        flushes: Vec<Vec<DeleteTask>>,
    }

    #[async_trait]
    impl UrlRepository for FakeDb {
        async fn ping(&self) -> Result<()> {
            Ok(())
        }

        async fn save(
            &self,
            key: &ShortKey,
            original_url: &str,
            owner_id: &str,
        ) -> Result<SaveOutcome> {
            let mut state = self.inner.lock().await;
            if state.records.contains_key(key.as_str()) {
                return Ok(SaveOutcome::Duplicate);
            }
            state.records.insert(
                key.as_str().to_owned(),
                (original_url.to_owned(), owner_id.to_owned()),
            );
            Ok(SaveOutcome::Created)
        }

        async fn get(&self, key: &ShortKey) -> Result<UrlRecord> {
            let state = self.inner.lock().await;
            let Some((original_url, owner_id)) = state.records.get(key.as_str()) else {
                return Err(StoreError::NotFound(key.to_string()));
            };
            Ok(UrlRecord {
                short_key: key.clone(),
                original_url: original_url.clone(),
                owner_id: owner_id.clone(),
                deleted: false,
            })
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        fn as_batch_saver(&self) -> Option<Arc<dyn BatchSaver>> {
            Some(Arc::new(self.clone()))
        }

        fn as_soft_deleter(&self) -> Option<Arc<dyn SoftDeleter>> {
            Some(Arc::new(self.clone()))
        }
    }

    #[async_trait]
    impl BatchSaver for FakeDb {
        async fn save_batch(&self, pairs: &[UrlPair]) -> Result<()> {
            let mut state = self.inner.lock().await;
            state.batch_calls += 1;
            for pair in pairs {
                state
                    .records
                    .entry(pair.short_key.as_str().to_owned())
                    .or_insert_with(|| (pair.original_url.clone(), String::new()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SoftDeleter for FakeDb {
        async fn soft_delete_batch(&self, tasks: &[DeleteTask]) -> Result<u64> {
            let mut state = self.inner.lock().await;
            let mut affected = 0;
            for task in tasks {
                let owned = state
                    .records
                    .get(task.short_key.as_str())
                    .is_some_and(|(_, owner)| owner == &task.owner_id);
                if owned {
                    state.records.remove(task.short_key.as_str());
                    affected += 1;
                }
            }
            state.flushes.push(tasks.to_vec());
            Ok(affected)
        }
    }

    fn slow_queue() -> DeleteQueueSettings {
        // Flushes only happen on shutdown with an interval this long.
        DeleteQueueSettings::builder()
            .flush_interval(Duration::from_secs(600))
            .build()
    }

    #[tokio::test]
    async fn shorten_derives_the_content_key_and_saves() {
        let store = UrlStore::new(Arc::new(MemoryRepository::new()));

        let (key, outcome) = store
            .shorten("http://mbrgaoyhv.yandex", "user-1")
            .await
            .unwrap();

        assert_eq!(key, ShortKey::new("_SGMGLQIsIM="));
        assert_eq!(outcome, SaveOutcome::Created);
        let record = store.get(&key).await.unwrap();
        assert_eq!(record.original_url, "http://mbrgaoyhv.yandex");
    }

    #[tokio::test]
    async fn save_batch_prefers_the_batch_capability() {
        let db = FakeDb::default();
        let store = UrlStore::with_settings(Arc::new(db.clone()), slow_queue());

        let pairs = vec![
            UrlPair {
                short_key: ShortKey::new("a"),
                original_url: "https://example.com/a".to_string(),
            },
            UrlPair {
                short_key: ShortKey::new("b"),
                original_url: "https://example.com/b".to_string(),
            },
        ];
        store.save_batch(&pairs).await.unwrap();

        let state = db.inner.lock().await;
        assert_eq!(state.batch_calls, 1);
        assert_eq!(state.records.len(), 2);
    }

    #[tokio::test]
    async fn save_batch_falls_back_to_sequential_saves() {
        let store = UrlStore::new(Arc::new(MemoryRepository::new()));

        let pairs = vec![
            UrlPair {
                short_key: ShortKey::new("a"),
                original_url: "https://example.com/a".to_string(),
            },
            UrlPair {
                short_key: ShortKey::new("b"),
                original_url: "https://example.com/b".to_string(),
            },
        ];
        store.save_batch(&pairs).await.unwrap();

        assert!(store.get(&ShortKey::new("a")).await.is_ok());
        assert!(store.get(&ShortKey::new("b")).await.is_ok());
    }

    #[tokio::test]
    async fn list_owned_without_the_capability_is_unsupported() {
        let store = UrlStore::new(Arc::new(MemoryRepository::new()));

        let err = store.list_owned("user-1").await.unwrap_err();

        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn enqueue_delete_without_the_capability_fails_fast() {
        let store = UrlStore::new(Arc::new(MemoryRepository::new()));

        let err = store
            .enqueue_delete(DeleteTask {
                owner_id: "user-1".to_string(),
                short_key: ShortKey::new("abc"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn queued_delete_is_invisible_until_the_flush() {
        let db = FakeDb::default();
        let store = UrlStore::with_settings(Arc::new(db.clone()), slow_queue());
        let key = ShortKey::new("abc");

        store.save(&key, "https://example.com", "user-1").await.unwrap();
        store
            .enqueue_delete(DeleteTask {
                owner_id: "user-1".to_string(),
                short_key: key.clone(),
            })
            .await
            .unwrap();

        assert!(store.get(&key).await.is_ok());

        store.shutdown().await;
        let err = store.get(&key).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn enqueue_after_shutdown_reports_queue_closed() {
        let db = FakeDb::default();
        let store = UrlStore::with_settings(Arc::new(db), slow_queue());

        store.shutdown().await;
        let err = store
            .enqueue_delete(DeleteTask {
                owner_id: "user-1".to_string(),
                short_key: ShortKey::new("abc"),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::QueueClosed));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let db = FakeDb::default();
        let store = UrlStore::with_settings(Arc::new(db), slow_queue());

        store.close().await.unwrap();
        store.close().await.unwrap();
    }
}
