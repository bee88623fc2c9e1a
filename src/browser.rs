//! Headless Chromium implementation of the renderer boundary.
//!
//! One browser process per session: the underlying automation handle is not
//! safely shareable across concurrent units, so each worker-chapter unit gets
//! its own launch.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt as _;
use tokio::task::JoinHandle;

use crate::credentials::Cookie;
use crate::renderer::{Element, PageRenderer, RendererError, RendererFactory};

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Chrome/Chromium executable. `None` lets chromiumoxide detect one.
    pub chrome_executable: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
    pub request_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            chrome_executable: None,
            window_width: 1280,
            window_height: 800,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Launches one headless Chromium per [`RendererFactory::create`] call.
pub struct HeadlessBrowserFactory {
    options: BrowserOptions,
}

impl HeadlessBrowserFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl RendererFactory for HeadlessBrowserFactory {
    async fn create(&self) -> Result<Box<dyn PageRenderer>, RendererError> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.options.window_width, self.options.window_height)
            .request_timeout(self.options.request_timeout)
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--mute-audio");
        if let Some(path) = &self.options.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(RendererError::Provision)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| RendererError::Provision(format!("launch browser: {err}")))?;

        // The CDP event stream must be drained for the connection to make
        // progress; it ends when the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(%err, "browser handler event error");
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(err) => {
                if let Err(close_err) = browser.close().await {
                    tracing::debug!(%close_err, "close browser after failed page open");
                }
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(RendererError::Provision(format!("open page: {err}")));
            }
        };

        Ok(Box::new(ChromiumRenderer {
            browser,
            page,
            handler_task,
        }))
    }
}

pub struct ChromiumRenderer {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl PageRenderer for ChromiumRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RendererError> {
        let navigation_error = |err: chromiumoxide::error::CdpError| RendererError::Navigation {
            url: url.to_owned(),
            reason: err.to_string(),
        };
        self.page.goto(url).await.map_err(navigation_error)?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(navigation_error)?;
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, RendererError> {
        let found = self
            .page
            .find_elements(selector)
            .await
            .map_err(|err| RendererError::Protocol(format!("query {selector:?}: {err}")))?;
        Ok(found
            .into_iter()
            .map(|inner| Box::new(ChromiumElement { inner }) as Box<dyn Element>)
            .collect())
    }

    async fn apply_cookie(&mut self, cookie: &Cookie) -> Result<(), RendererError> {
        let param = CookieParam::builder()
            .name(&cookie.name)
            .value(&cookie.value)
            .domain(&cookie.domain)
            .path(&cookie.path)
            .build()
            .map_err(RendererError::Protocol)?;
        self.page
            .set_cookies(vec![param])
            .await
            .map_err(|err| RendererError::Protocol(format!("set cookie {}: {err}", cookie.name)))?;
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), RendererError> {
        if let Err(err) = self.page.close().await {
            tracing::debug!(%err, "close page");
        }
        self.browser
            .close()
            .await
            .map_err(|err| RendererError::Protocol(format!("close browser: {err}")))?;
        // Reap the browser process so long runs do not accumulate zombies.
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

struct ChromiumElement {
    inner: chromiumoxide::element::Element,
}

#[async_trait]
impl Element for ChromiumElement {
    async fn text(&self) -> Result<String, RendererError> {
        let text = self
            .inner
            .inner_text()
            .await
            .map_err(|err| RendererError::Protocol(format!("read element text: {err}")))?;
        Ok(text.unwrap_or_default())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RendererError> {
        self.inner
            .attribute(name)
            .await
            .map_err(|err| RendererError::Protocol(format!("read attribute {name:?}: {err}")))
    }
}
