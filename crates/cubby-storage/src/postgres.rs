use async_trait::async_trait;
use cubby_core::{
    BatchSaver, DeleteTask, OwnerIndex, Result, SaveOutcome, ShortKey, SoftDeleter, StoreError,
    UrlPair, UrlRecord, UrlRepository,
};
use sqlx::postgres::PgPool;
use sqlx::{QueryBuilder, Row};
use std::sync::Arc;
use tracing::debug;

/// Postgres implementation of the repository contract.
///
/// Soft delete is a `deleted` flag. Reads only return active records, so
/// a soft-deleted key answers exactly like an absent one while the row
/// keeps occupying its short key. This is the only backend with the
/// batch-save, owner-listing and soft-delete capabilities; uniqueness is
/// enforced by the primary key, never by a read-before-write.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    /// Creates a repository from an existing Postgres connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new Postgres connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migrations: {e}")))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StoreError::InvalidData(message),
        _ => StoreError::WriteFailed(message),
    }
}

#[async_trait]
impl UrlRepository for PgRepository {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn save(
        &self,
        key: &ShortKey,
        original_url: &str,
        owner_id: &str,
    ) -> Result<SaveOutcome> {
        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_key, original_url, owner_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(key.as_str())
        .bind(original_url)
        .bind(owner_id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(SaveOutcome::Created),
            Err(err) if is_unique_violation(&err) => {
                debug!(key = %key, "short key already stored");
                Ok(SaveOutcome::Duplicate)
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn get(&self, key: &ShortKey) -> Result<UrlRecord> {
        let row = sqlx::query(
            r#"
            SELECT original_url, owner_id
            FROM short_urls
            WHERE short_key = $1
              AND NOT deleted
            LIMIT 1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Err(StoreError::NotFound(key.to_string()));
        };

        Ok(UrlRecord {
            short_key: key.clone(),
            original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
            owner_id: row.try_get("owner_id").map_err(map_sqlx_error)?,
            deleted: false,
        })
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    fn as_batch_saver(&self) -> Option<Arc<dyn BatchSaver>> {
        Some(Arc::new(self.clone()))
    }

    fn as_owner_index(&self) -> Option<Arc<dyn OwnerIndex>> {
        Some(Arc::new(self.clone()))
    }

    fn as_soft_deleter(&self) -> Option<Arc<dyn SoftDeleter>> {
        Some(Arc::new(self.clone()))
    }
}

#[async_trait]
impl BatchSaver for PgRepository {
    async fn save_batch(&self, pairs: &[UrlPair]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::BatchAborted(format!("begin: {e}")))?;

        for pair in pairs {
            let inserted = sqlx::query(
                r#"
                INSERT INTO short_urls (short_key, original_url)
                VALUES ($1, $2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(pair.short_key.as_str())
            .bind(pair.original_url.as_str())
            .execute(&mut *tx)
            .await;

            if let Err(err) = inserted {
                // Dropping the transaction rolls back every prior insert.
                return Err(StoreError::BatchAborted(err.to_string()));
            }
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::BatchAborted(format!("commit: {e}")))
    }
}

#[async_trait]
impl OwnerIndex for PgRepository {
    async fn list_owned(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT short_key, original_url, owner_id, deleted
            FROM short_urls
            WHERE owner_id = $1
            ORDER BY short_key
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|row| {
                let short_key: String = row.try_get("short_key").map_err(map_sqlx_error)?;
                Ok(UrlRecord {
                    short_key: ShortKey::new(short_key),
                    original_url: row.try_get("original_url").map_err(map_sqlx_error)?,
                    owner_id: row.try_get("owner_id").map_err(map_sqlx_error)?,
                    deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl SoftDeleter for PgRepository {
    async fn soft_delete_batch(&self, tasks: &[DeleteTask]) -> Result<u64> {
        // `IN ()` is not valid SQL.
        if tasks.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(
            "UPDATE short_urls SET deleted = TRUE WHERE (owner_id, short_key) IN ",
        );
        query.push_tuples(tasks, |mut b, task| {
            b.push_bind(task.owner_id.as_str())
                .push_bind(task.short_key.as_str());
        });

        let result = query
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
