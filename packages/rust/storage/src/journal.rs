//! Write-ahead journal of archives that have not finished both writes.
//!
//! One JSON file per document id under the journal directory. An entry is
//! recorded before the index write, marked once the index holds the
//! document, and cleared after the file write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use curator_shared::{CuratorError, Result};

/// An archive that was started but not confirmed complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingArchive {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Set once the index write has succeeded.
    #[serde(default)]
    pub index_written: bool,
    pub started_at: DateTime<Utc>,
}

impl PendingArchive {
    pub fn new(id: impl Into<String>, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            index_written: false,
            started_at: Utc::now(),
        }
    }
}

/// Directory-backed pending-archive journal.
#[derive(Debug, Clone)]
pub struct PendingJournal {
    dir: PathBuf,
}

impl PendingJournal {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| CuratorError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Persist (or replace) the entry for `entry.id`.
    pub async fn record(&self, entry: &PendingArchive) -> Result<()> {
        let json = serde_json::to_vec_pretty(entry)
            .map_err(|e| CuratorError::Storage(format!("failed to serialize journal entry: {e}")))?;

        let target = self.entry_path(&entry.id);
        let tmp = self.dir.join(format!(".{}.{}.tmp", entry.id, Uuid::now_v7()));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CuratorError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &target)
            .await
            .map_err(|e| CuratorError::io(&target, e))
    }

    /// The pending entry for `id`, if any.
    pub async fn get(&self, id: &str) -> Result<Option<PendingArchive>> {
        let path = self.entry_path(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CuratorError::io(&path, e)),
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            CuratorError::Storage(format!("invalid journal entry {}: {e}", path.display()))
        })
    }

    /// Flag the entry as having reached the index.
    pub async fn mark_indexed(&self, entry: &PendingArchive) -> Result<()> {
        let marked = PendingArchive {
            index_written: true,
            ..entry.clone()
        };
        self.record(&marked).await
    }

    /// Drop the entry once both writes are done. Missing entries are fine.
    pub async fn clear(&self, id: &str) -> Result<()> {
        let path = self.entry_path(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CuratorError::io(&path, e)),
        }
    }

    /// All pending entries, oldest first. Unreadable entries are skipped with a warning.
    pub async fn list(&self) -> Result<Vec<PendingArchive>> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| CuratorError::io(&self.dir, e))?;

        let mut entries = Vec::new();
        while let Some(item) = dir
            .next_entry()
            .await
            .map_err(|e| CuratorError::io(&self.dir, e))?
        {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = tokio::fs::read(&path)
                .await
                .map_err(|e| e.to_string())
                .and_then(|bytes| {
                    serde_json::from_slice::<PendingArchive>(&bytes).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable journal entry"),
            }
        }

        entries.sort_by_key(|e| e.started_at);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_journal() -> PendingJournal {
        let dir = std::env::temp_dir().join(format!("curator-journal-{}", Uuid::now_v7()));
        PendingJournal::open(dir).expect("open journal")
    }

    #[tokio::test]
    async fn record_mark_clear_lifecycle() {
        let journal = test_journal();
        let entry = PendingArchive::new("ch1", "Chapter One", "Hello");

        journal.record(&entry).await.unwrap();
        let pending = journal.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].index_written);

        journal.mark_indexed(&entry).await.unwrap();
        let pending = journal.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(pending[0].index_written);
        assert_eq!(pending[0].content, "Hello");

        journal.clear("ch1").await.unwrap();
        assert!(journal.list().await.unwrap().is_empty());
        // Clearing twice is harmless
        journal.clear("ch1").await.unwrap();

        let _ = std::fs::remove_dir_all(journal.dir());
    }

    #[tokio::test]
    async fn get_returns_the_entry_for_one_id() {
        let journal = test_journal();
        assert_eq!(journal.get("ch1").await.unwrap(), None);

        let entry = PendingArchive::new("ch1", "Chapter One", "Hello");
        journal.record(&entry).await.unwrap();
        journal.mark_indexed(&entry).await.unwrap();

        let found = journal.get("ch1").await.unwrap().unwrap();
        assert!(found.index_written);
        assert_eq!(found.content, "Hello");
        assert_eq!(journal.get("ch2").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(journal.dir());
    }

    #[tokio::test]
    async fn corrupt_entries_are_skipped() {
        let journal = test_journal();
        std::fs::write(journal.dir().join("broken.json"), b"{not json").unwrap();
        journal
            .record(&PendingArchive::new("ok", "T", "C"))
            .await
            .unwrap();

        let pending = journal.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "ok");

        let _ = std::fs::remove_dir_all(journal.dir());
    }
}
