use crate::error::Result;
use crate::key::ShortKey;
use crate::record::{DeleteTask, SaveOutcome, UrlPair, UrlRecord};
use async_trait::async_trait;
use std::sync::Arc;

/// Base contract every storage backend implements.
///
/// Optional operations live in separate capability traits
/// ([`BatchSaver`], [`OwnerIndex`], [`SoftDeleter`]). Which capabilities a
/// backend exposes is fixed at construction and discovered at runtime
/// through the `as_*` accessors: the default bodies return `None`, and a
/// capable backend overrides them with a handle to itself. Callers that
/// hold only `Arc<dyn UrlRepository>` can therefore upgrade to the richer
/// operation when it exists and fall back when it does not.
#[async_trait]
pub trait UrlRepository: Send + Sync + 'static {
    /// Liveness check. Fails with [`StoreError::Unavailable`] when the
    /// underlying store cannot be reached.
    ///
    /// [`StoreError::Unavailable`]: crate::error::StoreError::Unavailable
    async fn ping(&self) -> Result<()>;

    /// Inserts a record if the key is absent.
    ///
    /// An already-present key yields `Ok(SaveOutcome::Duplicate)` and
    /// leaves the existing record untouched. Concurrent saves of the same
    /// key must not corrupt state: exactly one logical record survives.
    async fn save(
        &self,
        key: &ShortKey,
        original_url: &str,
        owner_id: &str,
    ) -> Result<SaveOutcome>;

    /// Retrieves the record for a key.
    ///
    /// Fails with [`StoreError::NotFound`] when the key is absent or the
    /// record is soft-deleted; the two cases are indistinguishable to
    /// readers.
    ///
    /// [`StoreError::NotFound`]: crate::error::StoreError::NotFound
    async fn get(&self, key: &ShortKey) -> Result<UrlRecord>;

    /// Releases backend resources. Safe to call more than once.
    async fn close(&self) -> Result<()>;

    /// Batch-save capability, if this backend has one.
    fn as_batch_saver(&self) -> Option<Arc<dyn BatchSaver>> {
        None
    }

    /// Owner-listing capability, if this backend has one.
    fn as_owner_index(&self) -> Option<Arc<dyn OwnerIndex>> {
        None
    }

    /// Batched soft-delete capability, if this backend has one.
    fn as_soft_deleter(&self) -> Option<Arc<dyn SoftDeleter>> {
        None
    }
}

/// Saves many pairs as one atomic unit.
#[async_trait]
pub trait BatchSaver: Send + Sync {
    /// Persists every pair inside a single transaction.
    ///
    /// A pair whose key already exists is silently skipped while the rest
    /// of the batch still commits. Any other failure rolls the whole batch
    /// back and surfaces as [`StoreError::BatchAborted`].
    ///
    /// [`StoreError::BatchAborted`]: crate::error::StoreError::BatchAborted
    async fn save_batch(&self, pairs: &[UrlPair]) -> Result<()>;
}

/// Lists the records belonging to one owner.
#[async_trait]
pub trait OwnerIndex: Send + Sync {
    async fn list_owned(&self, owner_id: &str) -> Result<Vec<UrlRecord>>;
}

/// Applies accumulated soft deletes in one write.
#[async_trait]
pub trait SoftDeleter: Send + Sync {
    /// Marks every supplied (owner, key) pair deleted and returns the
    /// number of records actually affected. The count may be lower than
    /// the number of tasks (e.g. on ownership mismatch); that is a
    /// signal, not an error.
    async fn soft_delete_batch(&self, tasks: &[DeleteTask]) -> Result<u64>;
}
