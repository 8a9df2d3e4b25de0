//! Stage orchestration: fetch → (rewrite) → archive over one draft.
//!
//! Each `submit_*` call is one operator-triggered transition. Nothing chains
//! on its own, and no call returns `Err`: every failure becomes a
//! [`StageOutcome::Failure`] tagged with the stage that produced it. A failed
//! stage leaves the draft exactly as it was.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use curator_fetcher::{FetchedDocument, PageFetcher, export_local_copy, fetch_document};
use curator_rewriter::{Rewriter, rewrite_text};
use curator_shared::{
    ArchivedDocument, CuratorError, DEFAULT_ARCHIVE_TITLE, DEFAULT_REWRITE_TITLE, DocId, Draft,
    DraftStage,
};

use crate::archive::{ArchiveReceipt, ArchiveWriter};
use crate::reader::ArchiveReader;

/// Category of a failed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Fetch,
    Rewrite,
    InvalidIdentity,
    /// Nothing was persisted.
    ArchiveIndex,
    /// The index holds the document, the file store does not.
    ArchiveFilePartial,
    Read,
}

impl FailureKind {
    /// Classify `err`, using `stage` for errors outside the domain taxonomy.
    pub fn classify(err: &CuratorError, stage: FailureKind) -> Self {
        match err {
            CuratorError::Fetch { .. } => Self::Fetch,
            CuratorError::Rewrite { .. } => Self::Rewrite,
            CuratorError::InvalidIdentity { .. } => Self::InvalidIdentity,
            CuratorError::Archive {
                index_written: true,
                ..
            } => Self::ArchiveFilePartial,
            CuratorError::Archive { .. } => Self::ArchiveIndex,
            _ => stage,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Rewrite => "rewrite",
            Self::InvalidIdentity => "invalid_identity",
            Self::ArchiveIndex => "archive_index",
            Self::ArchiveFilePartial => "archive_file_partial",
            Self::Read => "read",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged result handed back to the interactive caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Success { data: T, message: String },
    Failure { kind: FailureKind, message: String },
}

impl<T> StageOutcome<T> {
    fn success(data: T, message: impl Into<String>) -> Self {
        Self::Success {
            data,
            message: message.into(),
        }
    }

    fn failure(err: &CuratorError, stage: FailureKind) -> Self {
        let kind = FailureKind::classify(err, stage);
        let mut message = err.to_string();
        if kind == FailureKind::ArchiveFilePartial {
            message.push_str("; the index entry was kept, retry the file write to repair");
        }
        Self::Failure { kind, message }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success { data, .. } => Some(data),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// The document half-written by the last partial archive.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PartialArchive {
    id: DocId,
    title: String,
    content: String,
}

/// The stage orchestrator. Owns the in-flight [`Draft`].
pub struct Pipeline {
    fetcher: Arc<dyn PageFetcher>,
    rewriter: Option<Arc<dyn Rewriter>>,
    writer: Arc<ArchiveWriter>,
    reader: ArchiveReader,
    export_dir: Option<PathBuf>,
    default_instruction: String,
    draft: Draft,
    partial: Option<PartialArchive>,
}

impl Pipeline {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        writer: Arc<ArchiveWriter>,
        reader: ArchiveReader,
        default_instruction: impl Into<String>,
    ) -> Self {
        let default_instruction = default_instruction.into();
        Self {
            fetcher,
            rewriter: None,
            writer,
            reader,
            export_dir: None,
            draft: Draft::with_instruction(default_instruction.clone()),
            default_instruction,
            partial: None,
        }
    }

    pub fn with_rewriter(mut self, rewriter: Arc<dyn Rewriter>) -> Self {
        self.rewriter = Some(rewriter);
        self
    }

    /// Write a local `{title}.txt` copy of every fetched page into `dir`.
    pub fn with_export_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.export_dir = dir;
        self
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    pub fn writer(&self) -> &ArchiveWriter {
        &self.writer
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.draft.title = title.into();
    }

    pub fn set_instruction(&mut self, instruction: impl Into<String>) {
        self.draft.instruction = instruction.into();
    }

    /// Set or clear the identity override.
    pub fn set_requested_id(&mut self, requested_id: Option<String>) {
        self.draft.requested_id = requested_id.filter(|s| !s.trim().is_empty());
    }

    /// Discard the draft and start over.
    pub fn reset(&mut self) {
        self.draft = Draft::with_instruction(self.default_instruction.clone());
    }

    /// Fetch `url` into the draft. Starts a fresh cycle after an archive.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn submit_url(&mut self, url: &str) -> StageOutcome<FetchedDocument> {
        let doc = match fetch_document(self.fetcher.as_ref(), url).await {
            Ok(doc) => doc,
            Err(err) => return StageOutcome::failure(&err, FailureKind::Fetch),
        };

        if let Some(dir) = &self.export_dir {
            match export_local_copy(dir, &doc).await {
                Ok(path) => info!(path = %path.display(), "local copy written"),
                Err(err) => warn!(error = %err, "could not write local copy"),
            }
        }

        if self.draft.stage == DraftStage::Archived {
            self.reset();
        }
        self.draft.title = doc.title.clone();
        self.draft.raw_text = doc.body.clone();
        self.draft.cleaned_text = None;
        self.draft.archived_id = None;
        self.draft.stage = DraftStage::Fetched;

        let message = format!("Fetched \"{}\" ({} characters)", doc.title, doc.body.len());
        StageOutcome::success(doc, message)
    }

    /// Rewrite `text` under `instruction`, or the draft's instruction when `None`.
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn submit_rewrite(
        &mut self,
        text: &str,
        title: &str,
        instruction: Option<&str>,
    ) -> StageOutcome<String> {
        let Some(rewriter) = self.rewriter.clone() else {
            let err = CuratorError::rewrite("no rewrite service configured");
            return StageOutcome::failure(&err, FailureKind::Rewrite);
        };

        let title = non_blank(title).unwrap_or(DEFAULT_REWRITE_TITLE).to_string();
        let instruction = instruction
            .and_then(non_blank)
            .unwrap_or(self.draft.instruction.as_str())
            .to_string();

        let cleaned = match rewrite_text(rewriter.as_ref(), text, &instruction).await {
            Ok(cleaned) => cleaned,
            Err(err) => return StageOutcome::failure(&err, FailureKind::Rewrite),
        };

        self.draft.title = title.clone();
        self.draft.instruction = instruction;
        self.draft.cleaned_text = Some(cleaned.clone());
        self.draft.stage = DraftStage::Cleaned;

        let message = format!("Rewrote \"{title}\" ({} characters)", cleaned.len());
        StageOutcome::success(cleaned, message)
    }

    /// Archive `content` under the id derived from `requested_id`, else `title`.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn submit_archive(
        &mut self,
        title: &str,
        content: &str,
        requested_id: Option<&str>,
    ) -> StageOutcome<ArchiveReceipt> {
        let title = non_blank(title).unwrap_or(DEFAULT_ARCHIVE_TITLE);
        let id = match derive_identity(title, requested_id) {
            Ok(id) => id,
            Err(err) => return StageOutcome::failure(&err, FailureKind::InvalidIdentity),
        };

        let receipt = match self.writer.archive(&id, title, content).await {
            Ok(receipt) => receipt,
            Err(err) => {
                if err.is_partial_archive() {
                    self.partial = Some(PartialArchive {
                        id,
                        title: title.to_string(),
                        content: content.to_string(),
                    });
                }
                return StageOutcome::failure(&err, FailureKind::ArchiveIndex);
            }
        };
        self.forget_partial(&receipt.id);

        self.draft.title = title.to_string();
        self.draft.archived_id = Some(receipt.id.clone());
        self.draft.stage = DraftStage::Archived;

        let message = if receipt.replaced {
            format!("Archived as {} (replaced existing file)", receipt.id)
        } else {
            format!("Archived as {}", receipt.id)
        };
        StageOutcome::success(receipt, message)
    }

    /// Redo the file half of a partial archive without re-indexing.
    #[instrument(skip_all, fields(title = %title))]
    pub async fn retry_file(
        &mut self,
        title: &str,
        content: &str,
        requested_id: Option<&str>,
    ) -> StageOutcome<ArchiveReceipt> {
        let title = non_blank(title).unwrap_or(DEFAULT_ARCHIVE_TITLE);
        let id = match derive_identity(title, requested_id) {
            Ok(id) => id,
            Err(err) => return StageOutcome::failure(&err, FailureKind::InvalidIdentity),
        };

        self.repair(&id, title, content).await
    }

    /// Redo the file half of this session's last partial archive, with the
    /// exact title and content that reached the index.
    pub async fn retry_last(&mut self) -> StageOutcome<ArchiveReceipt> {
        let Some(partial) = self.partial.clone() else {
            let err = CuratorError::validation("no partial archive to repair in this session");
            return StageOutcome::failure(&err, FailureKind::ArchiveFilePartial);
        };
        self.repair(&partial.id, &partial.title, &partial.content).await
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn repair(&mut self, id: &DocId, title: &str, content: &str) -> StageOutcome<ArchiveReceipt> {
        match self.writer.retry_file(id, title, content).await {
            Ok(receipt) => {
                self.forget_partial(&receipt.id);
                self.draft.archived_id = Some(receipt.id.clone());
                self.draft.stage = DraftStage::Archived;
                let message = format!("Repaired file for {}", receipt.id);
                StageOutcome::success(receipt, message)
            }
            Err(err) => StageOutcome::failure(&err, FailureKind::ArchiveFilePartial),
        }
    }

    fn forget_partial(&mut self, id: &DocId) {
        if self.partial.as_ref().is_some_and(|p| &p.id == id) {
            self.partial = None;
        }
    }

    pub async fn list_all(&self) -> StageOutcome<Vec<ArchivedDocument>> {
        match self.reader.list_all().await {
            Ok(documents) => {
                let message = format!("{} archived documents", documents.len());
                StageOutcome::success(documents, message)
            }
            Err(err) => StageOutcome::failure(&err, FailureKind::Read),
        }
    }
}

fn non_blank(s: &str) -> Option<&str> {
    Some(s).filter(|s| !s.trim().is_empty())
}

fn derive_identity(title: &str, requested_id: Option<&str>) -> curator_shared::Result<DocId> {
    DocId::derive(requested_id.and_then(non_blank).unwrap_or(title))
}
