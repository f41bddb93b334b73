use cubby_core::{Result, UrlRepository};
use cubby_storage::{FileRepository, MemoryRepository, PgRepository};
use std::path::PathBuf;
use std::sync::Arc;

/// Which backend to open and how to reach it.
#[derive(Debug, Clone)]
pub enum StorageSettings {
    /// Process-local map, nothing survives a restart.
    InMemory,
    /// Append-only JSON-lines log at `path`.
    AppendFile { path: PathBuf },
    /// Postgres reached through `dsn`.
    Postgres { dsn: String },
}

impl StorageSettings {
    /// Opens the configured backend.
    ///
    /// Postgres is pinged and migrated before it is handed out, so a bad
    /// DSN fails here rather than on the first request.
    pub async fn open(&self) -> Result<Arc<dyn UrlRepository>> {
        match self {
            Self::InMemory => Ok(Arc::new(MemoryRepository::new())),
            Self::AppendFile { path } => {
                let repo = FileRepository::open(path.clone()).await?;
                Ok(Arc::new(repo))
            }
            Self::Postgres { dsn } => {
                let repo = PgRepository::connect(dsn).await?;
                repo.ping().await?;
                repo.run_migrations().await?;
                Ok(Arc::new(repo))
            }
        }
    }
}
