use std::time::Duration;

use crate::formats::ChapterReference;
use crate::renderer::{PageRenderer, RendererError, WaitPolicy};
use crate::site::SiteProfile;

/// Extracted chapter text. Consumed immediately by assembly, never retained.
#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub title: String,
    pub paragraphs: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("content did not render within {timeout:?}: {url}")]
    ContentTimeout { url: String, timeout: Duration },
    #[error("content container has no paragraphs: {url}")]
    EmptyContent { url: String },
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Reads a chapter's title and body paragraphs from a rendered page.
#[derive(Debug, Clone)]
pub struct ChapterExtractor {
    profile: SiteProfile,
    wait: WaitPolicy,
}

impl ChapterExtractor {
    pub fn new(profile: SiteProfile, wait: WaitPolicy) -> Self {
        Self { profile, wait }
    }

    /// Navigate to the chapter and pull its content.
    ///
    /// The bounded wait for the content container is the sole synchronization
    /// point. A missing title is not fatal: a placeholder derived from the
    /// chapter's sequence number is used instead. A container with zero
    /// non-empty paragraphs is [`ExtractionError::EmptyContent`].
    pub async fn extract(
        &self,
        session: &mut dyn PageRenderer,
        chapter: &ChapterReference,
    ) -> Result<ChapterContent, ExtractionError> {
        session.navigate(&chapter.source_url).await?;

        let container = self
            .wait
            .wait_for_elements(session, &self.profile.content_container)
            .await?;
        if container.is_empty() {
            return Err(ExtractionError::ContentTimeout {
                url: chapter.source_url.clone(),
                timeout: self.wait.timeout,
            });
        }

        let title = self.read_title(session, chapter).await?;

        let mut raw_paragraphs = Vec::new();
        for element in session.find_elements(&self.profile.paragraph).await? {
            raw_paragraphs.push(element.text().await?);
        }
        let paragraphs = clean_paragraphs(raw_paragraphs);
        if paragraphs.is_empty() {
            return Err(ExtractionError::EmptyContent {
                url: chapter.source_url.clone(),
            });
        }

        Ok(ChapterContent { title, paragraphs })
    }

    async fn read_title(
        &self,
        session: &mut dyn PageRenderer,
        chapter: &ChapterReference,
    ) -> Result<String, RendererError> {
        let elements = session.find_elements(&self.profile.chapter_title).await?;
        if let Some(element) = elements.first() {
            let text = element.text().await?;
            let text = text.trim();
            if !text.is_empty() {
                return Ok(text.to_owned());
            }
        }
        tracing::debug!(
            url = %chapter.source_url,
            "chapter title missing; using placeholder"
        );
        Ok(format!("Chapter {}", chapter.sequence_number))
    }
}

/// Trim paragraphs and drop the empty ones, preserving document order.
fn clean_paragraphs(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|p| p.trim().to_owned())
        .filter(|p| !p.is_empty())
        .collect()
}
