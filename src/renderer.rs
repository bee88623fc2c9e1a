use std::time::Duration;

use async_trait::async_trait;

use crate::credentials::{Cookie, SessionCredentials};

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("provision renderer session: {0}")]
    Provision(String),
    #[error("navigate to {url}: {reason}")]
    Navigation { url: String, reason: String },
    #[error("renderer protocol error: {0}")]
    Protocol(String),
}

/// A rendered DOM element handle.
#[async_trait]
pub trait Element: Send + Sync {
    /// Rendered text content of the element.
    async fn text(&self) -> Result<String, RendererError>;

    /// Attribute value, or `None` when the attribute is absent.
    async fn attribute(&self, name: &str) -> Result<Option<String>, RendererError>;
}

/// An isolated, stateful handle onto a JavaScript-capable page renderer.
///
/// A session is owned by exactly one unit of work for its entire lifetime and
/// must be released with [`PageRenderer::close`] on every exit path.
#[async_trait]
pub trait PageRenderer: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), RendererError>;

    /// All elements currently matching `selector`, in document order.
    /// An empty result is not an error; content may simply not have rendered yet.
    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, RendererError>;

    async fn apply_cookie(&mut self, cookie: &Cookie) -> Result<(), RendererError>;

    async fn close(self: Box<Self>) -> Result<(), RendererError>;
}

/// Creates fresh renderer sessions. Sessions are never pooled: every call
/// yields an independent handle.
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn PageRenderer>, RendererError>;
}

/// Provision a fresh session and apply every credential cookie to it.
///
/// On a cookie application failure the half-provisioned session is closed
/// before the error is returned, so no renderer handle leaks.
pub async fn provision_session(
    factory: &dyn RendererFactory,
    credentials: &SessionCredentials,
) -> Result<Box<dyn PageRenderer>, RendererError> {
    let mut session = factory.create().await?;
    for cookie in &credentials.cookies {
        if let Err(err) = session.apply_cookie(cookie).await {
            if let Err(close_err) = session.close().await {
                tracing::warn!(%close_err, "close session after failed cookie application");
            }
            return Err(err);
        }
    }
    Ok(session)
}

/// Bounded poll-until-present policy for DOM readiness checks.
///
/// Every wait in the pipeline goes through [`WaitPolicy::wait_for_elements`];
/// there are no fixed sleeps. A timeout with zero matches means the content is
/// absent, not merely slow.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration) -> Self {
        let poll_interval = (timeout / 40).clamp(Duration::from_millis(10), Duration::from_millis(250));
        Self {
            timeout,
            poll_interval,
        }
    }

    /// Poll for `selector` until at least one element matches or the timeout
    /// elapses. Returns the matching elements, or an empty list on timeout.
    pub async fn wait_for_elements(
        &self,
        session: &mut dyn PageRenderer,
        selector: &str,
    ) -> Result<Vec<Box<dyn Element>>, RendererError> {
        let deadline = tokio::time::Instant::now() + self.timeout;
        loop {
            let found = session.find_elements(selector).await?;
            if !found.is_empty() {
                return Ok(found);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}
