use async_trait::async_trait;
use cubby_core::{Result, SaveOutcome, ShortKey, StoreError, UrlRecord, UrlRepository};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// One line of the append-only log.
///
/// `uuid` is assigned fresh on every append and ignored on replay; the
/// short key is the identity of a record.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    uuid: String,
    short_url: String,
    original_url: String,
}

impl StoredRecord {
    fn new(key: &ShortKey, original_url: &str) -> Self {
        Self {
            uuid: Uuid::new_v4().to_string(),
            short_url: key.as_str().to_owned(),
            original_url: original_url.to_owned(),
        }
    }
}

struct FileState {
    index: HashMap<String, String>,
    log: File,
}

/// Append-only file-backed implementation of the repository contract.
///
/// The whole log is replayed into an in-memory index when the repository
/// opens; lines that fail to parse are skipped with a warning. Every save
/// appends one JSON line and acknowledges only after the write returns.
/// The index is updated before the append, so a concurrent reader in the
/// same process can observe a record a moment before it is durable; after
/// a restart the log alone decides what exists.
///
/// The log format carries no owner, so every record in this backend is
/// anonymous and never soft-deleted.
pub struct FileRepository {
    path: PathBuf,
    state: RwLock<FileState>,
}

impl FileRepository {
    /// Opens the log at `path`, creating it if missing, and replays it.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let log = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("open {}: {e}", path.display())))?;
        let index = replay(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState { index, log }),
        })
    }

    /// Returns the path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn replay(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path)
        .await
        .map_err(|e| StoreError::Unavailable(format!("replay {}: {e}", path.display())))?;
    let mut lines = BufReader::new(file).lines();

    let mut index = HashMap::new();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| StoreError::Unavailable(format!("replay {}: {e}", path.display())))?
    {
        match serde_json::from_str::<StoredRecord>(&line) {
            Ok(record) => {
                index.insert(record.short_url, record.original_url);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unparseable log line"),
        }
    }

    Ok(index)
}

#[async_trait]
impl UrlRepository for FileRepository {
    async fn ping(&self) -> Result<()> {
        let _state = self.state.read().await;
        Ok(())
    }

    async fn save(
        &self,
        key: &ShortKey,
        original_url: &str,
        _owner_id: &str,
    ) -> Result<SaveOutcome> {
        let mut state = self.state.write().await;

        if state.index.contains_key(key.as_str()) {
            return Ok(SaveOutcome::Duplicate);
        }

        state
            .index
            .insert(key.as_str().to_owned(), original_url.to_owned());

        let mut line = serde_json::to_string(&StoredRecord::new(key, original_url))
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        line.push('\n');

        state
            .log
            .write_all(line.as_bytes())
            .await
            .map_err(|e| StoreError::WriteFailed(format!("append {}: {e}", self.path.display())))?;
        state
            .log
            .flush()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("append {}: {e}", self.path.display())))?;

        Ok(SaveOutcome::Created)
    }

    async fn get(&self, key: &ShortKey) -> Result<UrlRecord> {
        let state = self.state.read().await;

        let Some(original_url) = state.index.get(key.as_str()) else {
            return Err(StoreError::NotFound(key.to_string()));
        };

        Ok(UrlRecord {
            short_key: key.clone(),
            original_url: original_url.clone(),
            owner_id: String::new(),
            deleted: false,
        })
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state.write().await;

        state
            .log
            .flush()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("close {}: {e}", self.path.display())))?;
        state
            .log
            .sync_all()
            .await
            .map_err(|e| StoreError::WriteFailed(format!("close {}: {e}", self.path.display())))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn key(raw: &str) -> ShortKey {
        ShortKey::new(raw)
    }

    async fn open_repo(dir: &TempDir) -> FileRepository {
        FileRepository::open(dir.path().join("urls.log"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn save_then_get_returns_anonymous_record() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        let outcome = repo
            .save(&key("abc"), "https://example.com", "user-1")
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::Created);

        let record = repo.get(&key("abc")).await.unwrap();
        assert_eq!(record.original_url, "https://example.com");
        assert_eq!(record.owner_id, "");
        assert!(!record.deleted);
    }

    #[tokio::test]
    async fn saving_an_existing_key_reports_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        repo.save(&key("abc"), "https://example.com", "")
            .await
            .unwrap();
        let outcome = repo
            .save(&key("abc"), "https://other.example", "")
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Duplicate);
        let record = repo.get(&key("abc")).await.unwrap();
        assert_eq!(record.original_url, "https://example.com");
    }

    #[tokio::test]
    async fn get_unknown_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        let err = repo.get(&key("missing")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn reopening_replays_the_log() {
        let dir = tempfile::tempdir().unwrap();

        let repo = open_repo(&dir).await;
        repo.save(&key("one"), "https://example.com/1", "")
            .await
            .unwrap();
        repo.save(&key("two"), "https://example.com/2", "")
            .await
            .unwrap();
        repo.close().await.unwrap();
        drop(repo);

        let reopened = open_repo(&dir).await;
        assert_eq!(
            reopened.get(&key("one")).await.unwrap().original_url,
            "https://example.com/1"
        );
        assert_eq!(
            reopened.get(&key("two")).await.unwrap().original_url,
            "https://example.com/2"
        );
        assert_eq!(
            reopened
                .save(&key("one"), "https://example.com/1", "")
                .await
                .unwrap(),
            SaveOutcome::Duplicate
        );
    }

    #[tokio::test]
    async fn unparseable_lines_are_skipped_on_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls.log");

        let good = serde_json::json!({
            "uuid": "5b9c2f6e-7a0f-4430-9d2a-08f1f84b2a10",
            "short_url": "abc",
            "original_url": "https://example.com",
        });
        std::fs::write(&path, format!("{good}\nnot json at all\n")).unwrap();

        let repo = FileRepository::open(&path).await.unwrap();
        assert_eq!(
            repo.get(&key("abc")).await.unwrap().original_url,
            "https://example.com"
        );
    }

    #[tokio::test]
    async fn each_save_appends_one_json_line() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        repo.save(&key("abc"), "https://example.com", "")
            .await
            .unwrap();
        repo.save(&key("def"), "https://other.example", "")
            .await
            .unwrap();
        repo.close().await.unwrap();

        let contents = std::fs::read_to_string(repo.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: StoredRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.short_url, "abc");
        assert_eq!(first.original_url, "https://example.com");
        assert!(Uuid::parse_str(&first.uuid).is_ok());
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_key_yield_one_created() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(open_repo(&dir).await);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save(&key("abc"), "https://example.com", "")
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() == SaveOutcome::Created {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn close_can_be_called_twice() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        repo.save(&key("abc"), "https://example.com", "")
            .await
            .unwrap();
        repo.close().await.unwrap();
        repo.close().await.unwrap();
    }

    #[tokio::test]
    async fn no_optional_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let repo = open_repo(&dir).await;

        assert!(repo.as_batch_saver().is_none());
        assert!(repo.as_owner_index().is_none());
        assert!(repo.as_soft_deleter().is_none());
    }
}
