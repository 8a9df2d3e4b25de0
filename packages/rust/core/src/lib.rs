//! Core stage orchestration and archival for Curator.
//!
//! This crate ties the fetch and rewrite adapters to the archive writer and
//! reader, and exposes the operator-facing [`Pipeline`].

pub mod archive;
pub mod pipeline;
pub mod reader;

#[cfg(test)]
mod fakes;

pub use archive::{ArchiveReceipt, ArchiveWriter, ReconcileReport};
pub use pipeline::{FailureKind, Pipeline, StageOutcome};
pub use reader::ArchiveReader;
