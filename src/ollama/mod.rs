//! Access to the local model-serving binary.
//!
//! Everything the server needs from `ollama` goes through the
//! `ModelRunner` trait so the API can be exercised without the real
//! binary installed.
mod cli;

pub use cli::{OllamaCli, clean_line};

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Ollama exited {code}.\n{stderr}")]
    Exited { code: i32, stderr: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ModelRunner {
    /// Version string reported by the binary. Used as a health probe.
    async fn version(&self) -> Result<String>;

    /// Installed models, one entry per line of output.
    async fn list(&self) -> Result<Vec<String>>;

    /// Run `prompt` against `model`, sending each line of output
    /// (newline included) to `tx` as it is produced.
    ///
    /// Returns early without error when `tx` is closed.
    async fn run(
        &self,
        model: &str,
        prompt: &str,
        tx: mpsc::UnboundedSender<String>,
    ) -> Result<(), RunError>;
}

pub type SharedModelRunner = Arc<dyn ModelRunner + Send + Sync + 'static>;
