//! Archive reader: the index contents as a list of documents.

use std::sync::Arc;

use tracing::{debug, instrument};

use curator_shared::{ArchivedDocument, Result};
use curator_storage::{IndexSnapshot, VectorIndex};

pub struct ArchiveReader {
    index: Arc<dyn VectorIndex>,
}

impl ArchiveReader {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Every archived document. An unreachable index is an error, not an empty list.
    #[instrument(skip_all)]
    pub async fn list_all(&self) -> Result<Vec<ArchivedDocument>> {
        let snapshot = self.index.get_all().await?;
        let documents = pair_snapshot(snapshot);
        debug!(count = documents.len(), "archive listed");
        Ok(documents)
    }
}

/// Zip the parallel snapshot columns, stopping at the shortest.
/// A record without a string `title` gets an empty title.
pub fn pair_snapshot(snapshot: IndexSnapshot) -> Vec<ArchivedDocument> {
    snapshot
        .ids
        .into_iter()
        .zip(snapshot.documents)
        .zip(snapshot.metadatas)
        .map(|((id, content), metadata)| ArchivedDocument {
            id,
            title: metadata
                .get("title")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
            content,
        })
        .collect()
}
