//! Archive persistence: the document index and the flat-file store.
//!
//! Both stores sit behind traits so the archive writer can be driven by
//! in-memory fakes in tests:
//! - [`VectorIndex`]: named collection of `(id, document, metadata)` records,
//!   backed locally by [`LibsqlIndex`].
//! - [`FileStore`]: relative-path byte store, backed by [`LocalFileStore`].
//!
//! [`PendingJournal`] records archives that have not completed both writes
//! so a later run can finish them.

mod migrations;

pub mod files;
pub mod index;
pub mod journal;

use std::path::Path;

use async_trait::async_trait;
use curator_shared::Result;

pub use files::LocalFileStore;
pub use index::LibsqlIndex;
pub use journal::{PendingArchive, PendingJournal};

/// Free-form record metadata. Archived documents carry a `title` entry.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Full contents of a collection as parallel columns.
#[derive(Debug, Clone, Default)]
pub struct IndexSnapshot {
    pub ids: Vec<String>,
    pub documents: Vec<String>,
    pub metadatas: Vec<Metadata>,
}

/// Document index collaborator.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the record for `id`.
    async fn put(&self, id: &str, document: &str, metadata: &Metadata) -> Result<()>;

    /// Every record in the collection.
    async fn get_all(&self) -> Result<IndexSnapshot>;
}

/// Flat-file store collaborator. Paths are relative to the store root.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Create or fully replace the file at `path`.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;

    /// File contents, or `None` if it does not exist.
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>>;
}

/// Metadata map holding only a title.
pub fn title_metadata(title: &str) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("title".into(), serde_json::Value::String(title.to_string()));
    metadata
}
