//! Page fetching, content extraction, and the fetch-stage adapter.
//!
//! This crate provides:
//! - [`PageFetcher`]: the fetch collaborator seam
//! - [`HttpFetcher`]: `reqwest` + `scraper` implementation with SSRF protection
//! - [`fetch_document`]: the adapter mapping every collaborator error to a fetch failure
//! - [`export_local_copy`]: optional `{title}.txt` convenience export

pub mod engine;
pub mod extract;

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use curator_shared::{CuratorError, DocId, Result, render_document_file};

pub use engine::{HttpFetcher, PageFetcher};
pub use extract::{PARAGRAPH_SEPARATOR, Selectors, extract_document};

/// A single fetched document: its title and paragraph body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub title: String,
    /// Non-empty paragraphs in document order, blank-line separated.
    pub body: String,
}

/// Run the fetch collaborator and normalize its failures.
///
/// Any error becomes [`CuratorError::Fetch`] carrying the URL and cause.
#[instrument(skip_all, fields(url = %url))]
pub async fn fetch_document(fetcher: &dyn PageFetcher, url: &str) -> Result<FetchedDocument> {
    match fetcher.fetch(url).await {
        Ok(doc) => {
            info!(title = %doc.title, body_len = doc.body.len(), "page fetched");
            Ok(doc)
        }
        Err(err @ CuratorError::Fetch { .. }) => Err(err),
        Err(err) => {
            warn!(error = %err, "fetch failed");
            Err(CuratorError::fetch(url, err))
        }
    }
}

/// Write `{title}\n\n{body}` to `<dir>/<derived title>.txt`.
pub async fn export_local_copy(dir: &Path, doc: &FetchedDocument) -> Result<PathBuf> {
    let id = DocId::derive(&doc.title)?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| CuratorError::io(dir, e))?;

    let path = dir.join(format!("{id}.txt"));
    tokio::fs::write(&path, render_document_file(&doc.title, &doc.body))
        .await
        .map_err(|e| CuratorError::io(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Failing;

    #[async_trait]
    impl PageFetcher for Failing {
        async fn fetch(&self, _url: &str) -> Result<FetchedDocument> {
            Err(CuratorError::Network("connection refused".into()))
        }
    }

    struct Fixed;

    #[async_trait]
    impl PageFetcher for Fixed {
        async fn fetch(&self, _url: &str) -> Result<FetchedDocument> {
            Ok(FetchedDocument {
                title: "Page".into(),
                body: "Para1\n\nPara2".into(),
            })
        }
    }

    #[tokio::test]
    async fn adapter_wraps_errors_as_fetch_failures() {
        let err = fetch_document(&Failing, "https://example.com/page")
            .await
            .unwrap_err();
        match err {
            CuratorError::Fetch { url, cause } => {
                assert_eq!(url, "https://example.com/page");
                assert!(cause.contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn adapter_passes_documents_through() {
        let doc = fetch_document(&Fixed, "https://example.com/page")
            .await
            .unwrap();
        assert_eq!(doc.title, "Page");
        assert_eq!(doc.body, "Para1\n\nPara2");
    }

    #[tokio::test]
    async fn export_writes_title_and_body() {
        let dir = std::env::temp_dir().join(format!("curator-export-{}", uuid::Uuid::now_v7()));
        let doc = FetchedDocument {
            title: "Chapter One: Start".into(),
            body: "Hello".into(),
        };

        let path = export_local_copy(&dir, &doc).await.expect("export");
        assert_eq!(path.file_name().unwrap(), "Chapter_One_Start.txt");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Chapter One: Start\n\nHello"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn export_rejects_unusable_title() {
        let dir = std::env::temp_dir().join(format!("curator-export-{}", uuid::Uuid::now_v7()));
        let doc = FetchedDocument {
            title: "???".into(),
            body: "Hello".into(),
        };
        assert!(export_local_copy(&dir, &doc).await.is_err());
    }
}
