//! Shared types, error model, and configuration for Curator.
//!
//! This crate is the foundation depended on by all other Curator crates.
//! It provides:
//! - [`CuratorError`]: the unified error type
//! - Domain types ([`Draft`], [`ArchivedDocument`], [`DocId`])
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ArchiveConfig, FetchConfig, RewriteConfig, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{ArchiveStage, CuratorError, Result};
pub use types::{
    ArchivedDocument, DEFAULT_ARCHIVE_TITLE, DEFAULT_REWRITE_TITLE, DocId, Draft, DraftStage,
    render_document_file,
};
