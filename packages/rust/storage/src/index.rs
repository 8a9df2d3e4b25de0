//! libSQL-backed document index.
//!
//! Documents live in a named collection; `put` upserts by id so re-archiving
//! replaces the record instead of adding a second one.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use curator_shared::{CuratorError, Result};

use crate::migrations;
use crate::{IndexSnapshot, Metadata, VectorIndex};

/// Local libSQL index handle bound to one collection.
pub struct LibsqlIndex {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    collection: String,
}

fn storage_err(e: impl std::fmt::Display) -> CuratorError {
    CuratorError::Storage(e.to_string())
}

impl LibsqlIndex {
    /// Open or create an index database at `path`.
    pub async fn open(path: &Path, collection: &str) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CuratorError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let index = Self {
            db,
            conn,
            collection: collection.to_string(),
        };
        index.run_migrations().await?;
        Ok(index)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        CuratorError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0, // Table doesn't exist yet
        }
    }
}

#[async_trait]
impl VectorIndex for LibsqlIndex {
    #[instrument(skip_all, fields(collection = %self.collection, id = %id))]
    async fn put(&self, id: &str, document: &str, metadata: &Metadata) -> Result<()> {
        let metadata_json = serde_json::to_string(metadata).map_err(storage_err)?;
        let hash = content_hash(document);
        let now = Utc::now().to_rfc3339();

        self.conn
            .execute(
                "INSERT INTO documents (collection, id, document, metadata_json, content_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT(collection, id) DO UPDATE SET
                   document = excluded.document,
                   metadata_json = excluded.metadata_json,
                   content_hash = excluded.content_hash,
                   updated_at = excluded.updated_at",
                params![
                    self.collection.as_str(),
                    id,
                    document,
                    metadata_json.as_str(),
                    hash.as_str(),
                    now.as_str(),
                ],
            )
            .await
            .map_err(storage_err)?;

        debug!(content_hash = %hash, "document indexed");
        Ok(())
    }

    async fn get_all(&self) -> Result<IndexSnapshot> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, document, metadata_json FROM documents
                 WHERE collection = ?1 ORDER BY id",
                params![self.collection.as_str()],
            )
            .await
            .map_err(storage_err)?;

        let mut snapshot = IndexSnapshot::default();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id: String = row.get(0).map_err(storage_err)?;
            let document: String = row.get(1).map_err(storage_err)?;
            let metadata_json: String = row.get(2).map_err(storage_err)?;
            let metadata: Metadata = serde_json::from_str(&metadata_json).map_err(|e| {
                CuratorError::Storage(format!("invalid metadata for {id}: {e}"))
            })?;

            snapshot.ids.push(id);
            snapshot.documents.push(document);
            snapshot.metadatas.push(metadata);
        }
        Ok(snapshot)
    }
}

/// Compute SHA-256 hash of content.
fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::title_metadata;
    use uuid::Uuid;

    /// Create a temp file index for testing.
    async fn test_index() -> LibsqlIndex {
        let tmp = std::env::temp_dir().join(format!("curator_test_{}.db", Uuid::now_v7()));
        LibsqlIndex::open(&tmp, "test_collection")
            .await
            .expect("open test db")
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let index = test_index().await;
        assert_eq!(index.get_schema_version().await, 1);
        assert!(index.get_all().await.unwrap().ids.is_empty());
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("curator_test_{}.db", Uuid::now_v7()));
        let first = LibsqlIndex::open(&tmp, "c").await.expect("first open");
        drop(first);
        let second = LibsqlIndex::open(&tmp, "c").await.expect("second open");
        assert_eq!(second.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn put_then_get_all() {
        let index = test_index().await;
        index
            .put("ch1", "Hello", &title_metadata("Chapter One"))
            .await
            .expect("put");

        let snapshot = index.get_all().await.expect("get_all");
        assert_eq!(snapshot.ids, vec!["ch1"]);
        assert_eq!(snapshot.documents, vec!["Hello"]);
        assert_eq!(
            snapshot.metadatas[0].get("title").and_then(|v| v.as_str()),
            Some("Chapter One")
        );
    }

    #[tokio::test]
    async fn put_overwrites_same_id() {
        let index = test_index().await;
        index.put("ch1", "Hello", &title_metadata("One")).await.unwrap();
        index.put("ch1", "Goodbye", &title_metadata("Uno")).await.unwrap();

        let snapshot = index.get_all().await.unwrap();
        assert_eq!(snapshot.ids, vec!["ch1"]);
        assert_eq!(snapshot.documents, vec!["Goodbye"]);
        assert_eq!(
            snapshot.metadatas[0].get("title").and_then(|v| v.as_str()),
            Some("Uno")
        );
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let tmp = std::env::temp_dir().join(format!("curator_test_{}.db", Uuid::now_v7()));
        let a = LibsqlIndex::open(&tmp, "a").await.unwrap();
        a.put("doc", "in a", &title_metadata("A")).await.unwrap();
        drop(a);

        let b = LibsqlIndex::open(&tmp, "b").await.unwrap();
        assert!(b.get_all().await.unwrap().ids.is_empty());
    }

    #[test]
    fn test_content_hash() {
        let hash = content_hash("hello world");
        assert_eq!(hash.len(), 64); // SHA-256 = 64 hex chars
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }
}
