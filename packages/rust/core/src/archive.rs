//! Archive writer: index first, then the flat file, under one identity.
//!
//! Writes for the same id are serialized, so two archives of one id never
//! interleave their halves. When a [`PendingJournal`] is attached, each
//! archive is journaled before the index write and cleared after the file
//! write; [`ArchiveWriter::reconcile`] finishes whatever a crash left behind.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use curator_shared::{CuratorError, DocId, Result, render_document_file};
use curator_storage::{FileStore, PendingArchive, PendingJournal, VectorIndex, title_metadata};

/// Proof of a completed archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReceipt {
    pub id: DocId,
    /// File path relative to the file store root.
    pub path: PathBuf,
    /// An earlier file under the same id was overwritten.
    pub replaced: bool,
}

/// Outcome of a journal replay.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ReconcileReport {
    pub completed: Vec<String>,
    /// `(id, cause)` for entries that are still pending.
    pub failed: Vec<(String, String)>,
}

/// Per-identity async locks. Idle entries are pruned on each acquire.
#[derive(Default)]
struct IdentityLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl IdentityLocks {
    async fn acquire(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

pub struct ArchiveWriter {
    index: Arc<dyn VectorIndex>,
    files: Arc<dyn FileStore>,
    journal: Option<PendingJournal>,
    locks: IdentityLocks,
    extension: String,
}

impl ArchiveWriter {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        files: Arc<dyn FileStore>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            index,
            files,
            journal: None,
            locks: IdentityLocks::default(),
            extension: extension.into(),
        }
    }

    /// Journal every archive in `journal` until both writes land.
    pub fn with_journal(mut self, journal: PendingJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Store-relative file path for `id`.
    pub fn file_path(&self, id: &DocId) -> PathBuf {
        PathBuf::from(format!("{id}.{}", self.extension))
    }

    /// Persist `content` under `id` in the index, then in the file store.
    ///
    /// Index failure leaves the file store untouched. File failure after a
    /// successful index write is a partial archive
    /// ([`CuratorError::is_partial_archive`]); repair it with [`Self::retry_file`].
    #[instrument(skip_all, fields(id = %id))]
    pub async fn archive(&self, id: &DocId, title: &str, content: &str) -> Result<ArchiveReceipt> {
        let _guard = self.locks.acquire(id.as_str()).await;

        let entry = PendingArchive::new(id.as_str(), title, content);
        let previous = self.journal_get(id).await;
        self.journal_record(&entry).await;

        if let Err(err) = self.index.put(id.as_str(), content, &title_metadata(title)).await {
            warn!(error = %err, "index write failed");
            // An earlier unfinished archive of this id still needs finishing.
            match previous {
                Some(previous) => self.journal_record(&previous).await,
                None => self.journal_clear(id).await,
            }
            return Err(CuratorError::archive_index(err));
        }
        self.journal_mark(&entry).await;

        let receipt = self.write_file(id, title, content).await.map_err(|err| {
            warn!(error = %err, "file write failed after index write");
            CuratorError::archive_file(err)
        })?;
        self.journal_clear(id).await;

        info!(path = %receipt.path.display(), replaced = receipt.replaced, "document archived");
        Ok(receipt)
    }

    /// Redo only the file half of an archive whose index write succeeded.
    ///
    /// When the journal holds an indexed entry for `id`, its title and
    /// content are written instead of the supplied ones, so the file always
    /// matches what the index holds.
    #[instrument(skip_all, fields(id = %id))]
    pub async fn retry_file(&self, id: &DocId, title: &str, content: &str) -> Result<ArchiveReceipt> {
        let _guard = self.locks.acquire(id.as_str()).await;

        let journaled = self.journal_get(id).await.filter(|entry| entry.index_written);
        let (title, content) = match &journaled {
            Some(entry) => {
                if entry.title != title || entry.content != content {
                    warn!("supplied text differs from the indexed copy; writing the indexed copy");
                }
                (entry.title.as_str(), entry.content.as_str())
            }
            None => (title, content),
        };

        let receipt = self
            .write_file(id, title, content)
            .await
            .map_err(CuratorError::archive_file)?;
        self.journal_clear(id).await;

        info!(path = %receipt.path.display(), "archive file repaired");
        Ok(receipt)
    }

    /// Finish every journaled archive: the index half if it never landed,
    /// then the file half.
    #[instrument(skip_all)]
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let Some(journal) = &self.journal else {
            return Ok(report);
        };

        for entry in journal.list().await? {
            match self.replay(journal, &entry).await {
                Ok(()) => report.completed.push(entry.id),
                Err(err) => {
                    warn!(id = %entry.id, error = %err, "pending archive still incomplete");
                    report.failed.push((entry.id, err.to_string()));
                }
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            "reconcile finished"
        );
        Ok(report)
    }

    async fn replay(&self, journal: &PendingJournal, entry: &PendingArchive) -> Result<()> {
        let id = DocId::try_from(entry.id.clone())?;
        let _guard = self.locks.acquire(id.as_str()).await;

        if !entry.index_written {
            self.index
                .put(id.as_str(), &entry.content, &title_metadata(&entry.title))
                .await
                .map_err(CuratorError::archive_index)?;
            journal.mark_indexed(entry).await?;
        }
        self.write_file(&id, &entry.title, &entry.content)
            .await
            .map_err(CuratorError::archive_file)?;
        journal.clear(id.as_str()).await
    }

    async fn write_file(&self, id: &DocId, title: &str, content: &str) -> Result<ArchiveReceipt> {
        let path = self.file_path(id);
        let rendered = render_document_file(title, content);
        let existing = self.files.read(&path).await?;
        if existing.as_deref() == Some(rendered.as_bytes()) {
            debug!(path = %path.display(), "file already up to date");
        } else {
            self.files.write(&path, rendered.as_bytes()).await?;
        }
        Ok(ArchiveReceipt {
            id: id.clone(),
            path,
            replaced: existing.is_some(),
        })
    }

    // Journal bookkeeping never fails an archive.

    async fn journal_get(&self, id: &DocId) -> Option<PendingArchive> {
        let journal = self.journal.as_ref()?;
        match journal.get(id.as_str()).await {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "could not read pending archive");
                None
            }
        }
    }

    async fn journal_record(&self, entry: &PendingArchive) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.record(entry).await {
                warn!(error = %err, "could not journal pending archive");
            }
        }
    }

    async fn journal_mark(&self, entry: &PendingArchive) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.mark_indexed(entry).await {
                warn!(error = %err, "could not mark pending archive as indexed");
            }
        }
    }

    async fn journal_clear(&self, id: &DocId) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.clear(id.as_str()).await {
                warn!(error = %err, "could not clear pending archive");
            }
        }
    }
}
