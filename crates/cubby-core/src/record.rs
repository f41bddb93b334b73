use crate::key::ShortKey;
use serde::{Deserialize, Serialize};

/// A stored URL mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// The key the record is addressed by.
    pub short_key: ShortKey,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Owner of the record; the empty string marks an anonymous save.
    pub owner_id: String,
    /// Soft-delete marker. Flips false to true exactly once, never back.
    pub deleted: bool,
}

/// One (key, URL) entry of a batch save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPair {
    pub short_key: ShortKey,
    pub original_url: String,
}

/// A soft-delete request for one key, scoped to its owner.
///
/// Tasks exist only between enqueue and the flush that applies them; the
/// delete pipeline owns them exclusively once enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub owner_id: String,
    pub short_key: ShortKey,
}

/// Outcome of a single save.
///
/// A duplicate is a signal, not a failure: the record that already holds
/// the key survives untouched and the caller may still hand out the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new record was created.
    Created,
    /// The key was already present; nothing was written.
    Duplicate,
}

impl SaveOutcome {
    /// True when the key was already present.
    pub fn is_duplicate(self) -> bool {
        matches!(self, SaveOutcome::Duplicate)
    }
}
