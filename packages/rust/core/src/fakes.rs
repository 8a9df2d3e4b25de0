//! In-memory collaborators for orchestrator and writer tests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use curator_fetcher::{FetchedDocument, PageFetcher};
use curator_rewriter::Rewriter;
use curator_shared::{CuratorError, Result};
use curator_storage::{FileStore, IndexSnapshot, Metadata, VectorIndex};

/// Shared, ordered record of collaborator calls.
pub type EventLog = Arc<Mutex<Vec<String>>>;

fn log(events: &Option<EventLog>, event: String) {
    if let Some(events) = events {
        events.lock().unwrap().push(event);
    }
}

#[derive(Default)]
pub struct MemoryIndex {
    pub records: Mutex<BTreeMap<String, (String, Metadata)>>,
    pub fail_put: AtomicBool,
    pub fail_get: AtomicBool,
    pub puts: AtomicUsize,
    pub delay: Option<Duration>,
    pub events: Option<EventLog>,
}

impl MemoryIndex {
    pub fn document(&self, id: &str) -> Option<(String, Metadata)> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn put(&self, id: &str, document: &str, metadata: &Metadata) -> Result<()> {
        log(&self.events, format!("index:start:{document}"));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(CuratorError::Storage("index unavailable".into()));
        }
        self.records
            .lock()
            .unwrap()
            .insert(id.to_string(), (document.to_string(), metadata.clone()));
        log(&self.events, format!("index:done:{document}"));
        Ok(())
    }

    async fn get_all(&self) -> Result<IndexSnapshot> {
        if self.fail_get.load(Ordering::SeqCst) {
            return Err(CuratorError::Storage("index unavailable".into()));
        }
        let mut snapshot = IndexSnapshot::default();
        for (id, (document, metadata)) in self.records.lock().unwrap().iter() {
            snapshot.ids.push(id.clone());
            snapshot.documents.push(document.clone());
            snapshot.metadatas.push(metadata.clone());
        }
        Ok(snapshot)
    }
}

#[derive(Default)]
pub struct MemoryFiles {
    pub files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    pub fail_write: AtomicBool,
    pub writes: AtomicUsize,
    pub events: Option<EventLog>,
}

impl MemoryFiles {
    pub fn text(&self, path: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(Path::new(path))
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }
}

#[async_trait]
impl FileStore for MemoryFiles {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.load(Ordering::SeqCst) {
            return Err(CuratorError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only filesystem"),
            ));
        }
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), bytes.to_vec());
        log(
            &self.events,
            format!("file:{}", String::from_utf8_lossy(bytes).rsplit('\n').next().unwrap_or("")),
        );
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }
}

/// Fetcher that returns a fixed document, or fails when `doc` is `None`.
pub struct ScriptedFetcher {
    pub doc: Option<FetchedDocument>,
}

impl ScriptedFetcher {
    pub fn page(title: &str, body: &str) -> Self {
        Self {
            doc: Some(FetchedDocument {
                title: title.into(),
                body: body.into(),
            }),
        }
    }

    pub fn failing() -> Self {
        Self { doc: None }
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedDocument> {
        self.doc
            .clone()
            .ok_or_else(|| CuratorError::Network("connection refused".into()))
    }
}

/// Rewriter that summarizes by echoing the first line of the text, or fails.
pub struct ScriptedRewriter {
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedRewriter {
    pub fn working() -> Self {
        Self {
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Rewriter for ScriptedRewriter {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            return Err(CuratorError::Network("request timed out".into()));
        }
        let body = prompt.split_once("\n\n").map(|(_, t)| t).unwrap_or(prompt);
        Ok(format!("  Summary: {}  ", body.lines().next().unwrap_or_default()))
    }
}
