//! In-memory renderer backing the pipeline tests: pages are maps from CSS
//! selector to element lists, keyed by exact URL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use novelbind::credentials::Cookie;
use novelbind::renderer::{Element, PageRenderer, RendererError, RendererFactory};
use novelbind::site::SiteProfile;

#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    content: String,
    attrs: HashMap<String, String>,
}

impl FakeElement {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            attrs: HashMap::new(),
        }
    }

    pub fn link(href: &str) -> Self {
        Self {
            content: String::new(),
            attrs: HashMap::from([("href".to_owned(), href.to_owned())]),
        }
    }
}

#[async_trait]
impl Element for FakeElement {
    async fn text(&self) -> Result<String, RendererError> {
        Ok(self.content.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, RendererError> {
        Ok(self.attrs.get(name).cloned())
    }
}

type FakePage = HashMap<String, Vec<FakeElement>>;

#[derive(Default)]
pub struct FakeSite {
    profile: SiteProfile,
    pages: Mutex<HashMap<String, FakePage>>,
    visits: Mutex<Vec<String>>,
    sessions_created: AtomicUsize,
    sessions_closed: AtomicUsize,
    sessions_leaked: AtomicUsize,
    cookies_applied: AtomicUsize,
    provision_attempts: AtomicUsize,
    failing_provision_attempts: Mutex<Vec<usize>>,
}

impl FakeSite {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_page(&self, url: &str, entries: Vec<(&str, Vec<FakeElement>)>) {
        let page = entries
            .into_iter()
            .map(|(selector, elements)| (selector.to_owned(), elements))
            .collect();
        self.pages.lock().unwrap().insert(url.to_owned(), page);
    }

    /// Series landing page carrying only the series title element.
    pub fn add_series_page(&self, url: &str, title: &str) {
        self.add_page(
            url,
            vec![(
                self.profile.series_title.as_str(),
                vec![FakeElement::text(title)],
            )],
        );
    }

    /// Listing page with one chapter link per href, in order.
    pub fn add_listing_page(&self, url: &str, hrefs: &[&str]) {
        let links = hrefs.iter().map(|href| FakeElement::link(href)).collect();
        self.add_page(url, vec![(self.profile.chapter_link.as_str(), links)]);
    }

    /// Chapter page with a content container, a title and body paragraphs.
    pub fn add_chapter_page(&self, url: &str, title: &str, paragraphs: &[&str]) {
        self.add_page(
            url,
            vec![
                (
                    self.profile.content_container.as_str(),
                    vec![FakeElement::text("")],
                ),
                (
                    self.profile.chapter_title.as_str(),
                    vec![FakeElement::text(title)],
                ),
                (
                    self.profile.paragraph.as_str(),
                    paragraphs.iter().map(|p| FakeElement::text(p)).collect(),
                ),
            ],
        );
    }

    /// Chapter page whose content container renders but holds no paragraphs.
    pub fn add_hollow_chapter_page(&self, url: &str, title: &str) {
        self.add_page(
            url,
            vec![
                (
                    self.profile.content_container.as_str(),
                    vec![FakeElement::text("")],
                ),
                (
                    self.profile.chapter_title.as_str(),
                    vec![FakeElement::text(title)],
                ),
            ],
        );
    }

    /// Fail these 1-based provision attempts with a provisioning error.
    pub fn fail_provision_attempts(&self, attempts: &[usize]) {
        *self.failing_provision_attempts.lock().unwrap() = attempts.to_vec();
    }

    pub fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub fn visited(&self, url: &str) -> bool {
        self.visits.lock().unwrap().iter().any(|v| v == url)
    }

    pub fn sessions_created(&self) -> usize {
        self.sessions_created.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }

    pub fn sessions_leaked(&self) -> usize {
        self.sessions_leaked.load(Ordering::SeqCst)
    }

    pub fn cookies_applied(&self) -> usize {
        self.cookies_applied.load(Ordering::SeqCst)
    }
}

pub struct FakeRenderer {
    site: Arc<FakeSite>,
    current_url: Option<String>,
    closed: bool,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn navigate(&mut self, url: &str) -> Result<(), RendererError> {
        self.site.visits.lock().unwrap().push(url.to_owned());
        self.current_url = Some(url.to_owned());
        Ok(())
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Box<dyn Element>>, RendererError> {
        let Some(current_url) = &self.current_url else {
            return Ok(Vec::new());
        };
        let pages = self.site.pages.lock().unwrap();
        let elements = pages
            .get(current_url)
            .and_then(|page| page.get(selector))
            .cloned()
            .unwrap_or_default();
        Ok(elements
            .into_iter()
            .map(|el| Box::new(el) as Box<dyn Element>)
            .collect())
    }

    async fn apply_cookie(&mut self, _cookie: &Cookie) -> Result<(), RendererError> {
        self.site.cookies_applied.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(mut self: Box<Self>) -> Result<(), RendererError> {
        self.closed = true;
        self.site.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for FakeRenderer {
    fn drop(&mut self) {
        if !self.closed {
            self.site.sessions_leaked.fetch_add(1, Ordering::SeqCst);
        }
    }
}

pub struct FakeFactory {
    site: Arc<FakeSite>,
}

impl FakeFactory {
    pub fn new(site: Arc<FakeSite>) -> Self {
        Self { site }
    }
}

#[async_trait]
impl RendererFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn PageRenderer>, RendererError> {
        let attempt = self.site.provision_attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .site
            .failing_provision_attempts
            .lock()
            .unwrap()
            .contains(&attempt)
        {
            return Err(RendererError::Provision(format!(
                "browser did not start (attempt {attempt})"
            )));
        }
        self.site.sessions_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeRenderer {
            site: Arc::clone(&self.site),
            current_url: None,
            closed: false,
        }))
    }
}
