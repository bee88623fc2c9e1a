use std::path::Path;

use async_trait::async_trait;

use crate::assemble::DocumentPayload;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("write document {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Persists an assembled document at a path.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn write(&self, payload: &DocumentPayload, path: &Path) -> Result<(), SinkError>;
}

/// Writes documents as Markdown: a single `#` heading followed by one
/// paragraph per body block. Re-running a download overwrites the previous
/// file for the same chapter.
#[derive(Debug, Default)]
pub struct MarkdownSink;

impl MarkdownSink {
    fn render(payload: &DocumentPayload) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n", payload.heading));
        for block in &payload.blocks {
            out.push('\n');
            out.push_str(block);
            out.push('\n');
        }
        out
    }
}

#[async_trait]
impl DocumentSink for MarkdownSink {
    async fn write(&self, payload: &DocumentPayload, path: &Path) -> Result<(), SinkError> {
        let io_err = |source: std::io::Error| SinkError::Io {
            path: path.display().to_string(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        tokio::fs::write(path, Self::render(payload))
            .await
            .map_err(io_err)?;
        Ok(())
    }
}
