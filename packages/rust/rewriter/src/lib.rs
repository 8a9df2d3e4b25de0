//! Instruction-guided rewriting through a language-model collaborator.
//!
//! [`Rewriter`] is the seam: it takes one combined prompt and returns text.
//! [`rewrite_text`] is the stage adapter: it builds the prompt, trims the
//! answer, and turns every failure (including an empty answer) into
//! [`CuratorError::Rewrite`].

pub mod client;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use curator_shared::{CuratorError, Result};

pub use client::OpenRouterRewriter;

/// The rewrite collaborator.
#[async_trait]
pub trait Rewriter: Send + Sync {
    /// Send a single prompt, return the raw completion text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Combine the instruction and the text into one request.
pub fn build_prompt(instruction: &str, text: &str) -> String {
    format!("{instruction}\n\n{text}")
}

/// Rewrite `text` under `instruction`. No retries.
#[instrument(skip_all, fields(text_len = text.len()))]
pub async fn rewrite_text(rewriter: &dyn Rewriter, text: &str, instruction: &str) -> Result<String> {
    let prompt = build_prompt(instruction, text);

    let completion = match rewriter.complete(&prompt).await {
        Ok(completion) => completion,
        Err(err @ CuratorError::Rewrite { .. }) => return Err(err),
        Err(err) => {
            warn!(error = %err, "rewrite failed");
            return Err(CuratorError::rewrite(err));
        }
    };

    let cleaned = completion.trim();
    if cleaned.is_empty() {
        warn!("rewrite returned empty text");
        return Err(CuratorError::rewrite("empty response from rewrite service"));
    }

    info!(cleaned_len = cleaned.len(), "text rewritten");
    Ok(cleaned.to_string())
}
