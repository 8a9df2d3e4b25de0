//! Core domain types for Curator drafts and archived documents.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CuratorError, Result};

/// Title used when the rewrite stage is submitted without one.
pub const DEFAULT_REWRITE_TITLE: &str = "Unknown Chapter";

/// Title used when the archive stage is submitted without one.
pub const DEFAULT_ARCHIVE_TITLE: &str = "Untitled";

/// Everything outside letters, digits, underscore, hyphen and space.
static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_\- ]+").expect("static pattern"));

// ---------------------------------------------------------------------------
// DocId
// ---------------------------------------------------------------------------

/// Filesystem- and index-safe document identifier.
///
/// Only ever built through [`DocId::derive`], so every value contains
/// nothing but ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocId(String);

impl DocId {
    /// Derive an identifier from a free-text title or filename.
    ///
    /// Strips disallowed characters, then turns spaces into underscores.
    /// Deterministic and idempotent; fails when nothing is left.
    pub fn derive(name: &str) -> Result<Self> {
        let stripped = DISALLOWED.replace_all(name, "");
        if stripped.is_empty() {
            return Err(CuratorError::InvalidIdentity {
                input: name.to_string(),
            });
        }
        Ok(Self(stripped.replace(' ', "_")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocId {
    type Error = CuratorError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::derive(&value)
    }
}

impl From<DocId> for String {
    fn from(id: DocId) -> Self {
        id.0
    }
}

impl AsRef<str> for DocId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Where the in-flight draft sits in the fetch → rewrite → archive cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftStage {
    #[default]
    Empty,
    Fetched,
    Cleaned,
    Archived,
}

impl std::fmt::Display for DraftStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Empty => "empty",
            Self::Fetched => "fetched",
            Self::Cleaned => "cleaned",
            Self::Archived => "archived",
        };
        f.write_str(s)
    }
}

/// The unit of work carried between stages during one interactive session.
///
/// Never persisted. Holds at most one raw and one cleaned text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Draft {
    /// Current position in the stage cycle.
    pub stage: DraftStage,
    /// Human-readable label, from the fetched page or the operator.
    pub title: String,
    /// Extracted body text from the last successful fetch.
    pub raw_text: String,
    /// Rewritten body; absent until a rewrite succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleaned_text: Option<String>,
    /// Editing directive for the rewrite stage.
    pub instruction: String,
    /// Operator override for the archive identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_id: Option<String>,
    /// Identity of the last successful archive in this cycle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived_id: Option<DocId>,
}

impl Draft {
    /// A fresh draft whose instruction is preset to `instruction`.
    pub fn with_instruction(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            ..Default::default()
        }
    }

    /// The text an archive would persist: cleaned if present, otherwise raw.
    pub fn archivable_text(&self) -> &str {
        self.cleaned_text.as_deref().unwrap_or(&self.raw_text)
    }
}

// ---------------------------------------------------------------------------
// ArchivedDocument
// ---------------------------------------------------------------------------

/// The persisted artifact, stored once in the index and once as a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedDocument {
    pub id: String,
    pub title: String,
    pub content: String,
}

/// Render the flat-file body for a document: `{title}\n\n{content}`.
pub fn render_document_file(title: &str, content: &str) -> String {
    format!("{title}\n\n{content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_strips_and_underscores() {
        let id = DocId::derive("Chapter 1: The Beginning!").expect("derive");
        assert_eq!(id.as_str(), "Chapter_1_The_Beginning");

        let id = DocId::derive("already_safe-id").expect("derive");
        assert_eq!(id.as_str(), "already_safe-id");
    }

    #[test]
    fn derive_only_allowed_characters() {
        for input in [
            "Hello, World",
            "Ünïcödé tïtle",
            "tabs\tand\nnewlines",
            "path/../escape",
            "Page",
            "  padded  ",
        ] {
            let id = DocId::derive(input).expect("derive");
            assert!(
                id.as_str()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "{input:?} -> {id}"
            );
        }
    }

    #[test]
    fn derive_is_idempotent() {
        for input in ["The Wind in the Willows", "a-b c_d", "x"] {
            let once = DocId::derive(input).unwrap();
            let twice = DocId::derive(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn derive_rejects_empty_results() {
        for input in ["", "***", "!?."] {
            let err = DocId::derive(input).unwrap_err();
            assert!(matches!(err, CuratorError::InvalidIdentity { .. }));
        }
    }

    #[test]
    fn doc_id_deserialization_sanitizes() {
        let id: DocId = serde_json::from_str(r#""My Doc!""#).expect("deserialize");
        assert_eq!(id.as_str(), "My_Doc");
        assert!(serde_json::from_str::<DocId>(r#""@@""#).is_err());
    }

    #[test]
    fn draft_archivable_text_prefers_cleaned() {
        let mut draft = Draft::with_instruction("Summarize");
        draft.raw_text = "raw".into();
        assert_eq!(draft.archivable_text(), "raw");
        draft.cleaned_text = Some("clean".into());
        assert_eq!(draft.archivable_text(), "clean");
        assert_eq!(draft.stage, DraftStage::Empty);
    }

    #[test]
    fn document_file_format() {
        assert_eq!(
            render_document_file("Chapter One", "Hello"),
            "Chapter One\n\nHello"
        );
    }
}
