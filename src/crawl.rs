use std::path::Path;

use anyhow::Context as _;
use url::Url;

use crate::assemble::sanitize_file_name_component;
use crate::cli::DiscoverArgs;
use crate::formats::{ChapterReference, SeriesInfo};
use crate::renderer::{PageRenderer, RendererError, WaitPolicy};
use crate::site::SiteProfile;

/// Safety valve for the open-ended pagination loop. A real series listing
/// terminates with an empty page; a renderer stuck returning stale content
/// would otherwise page forever.
pub const DEFAULT_MAX_PAGES: u32 = 100;

const UNKNOWN_SERIES_NAME: &str = "Unknown Series";

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("series url is not valid: {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("series title did not render at {url}")]
    SeriesNotFound { url: String },
    #[error("pagination did not terminate within {max_pages} pages ({collected} chapters collected)")]
    Truncated { max_pages: u32, collected: usize },
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Enumerates a series: display name plus every chapter URL, in order.
///
/// Discovery is sequential by nature: whether page N+1 exists is only known
/// after observing page N.
#[derive(Debug, Clone)]
pub struct SeriesCrawler {
    profile: SiteProfile,
    wait: WaitPolicy,
    max_pages: u32,
}

impl SeriesCrawler {
    pub fn new(profile: SiteProfile, wait: WaitPolicy) -> Self {
        Self {
            profile,
            wait,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Resolve the series identity and enumerate its chapters.
    ///
    /// Pages through the listing until a page yields zero chapter links.
    /// Sequence numbers are the 1-based running index across all pages in the
    /// order pages and links were encountered. An empty chapter list is not an
    /// error; the caller decides whether that is terminal.
    pub async fn discover(
        &self,
        session: &mut dyn PageRenderer,
        series_url: &str,
        output_root: &Path,
    ) -> Result<(SeriesInfo, Vec<ChapterReference>), DiscoveryError> {
        let base_url = Url::parse(series_url).map_err(|err| DiscoveryError::InvalidUrl {
            url: series_url.to_owned(),
            reason: err.to_string(),
        })?;

        let series = self.resolve_series(session, &base_url, output_root).await?;
        tracing::info!(series = %series.display_name, "resolved series");

        let mut chapters: Vec<ChapterReference> = Vec::new();
        for page in 1.. {
            if page > self.max_pages {
                return Err(DiscoveryError::Truncated {
                    max_pages: self.max_pages,
                    collected: chapters.len(),
                });
            }

            let page_url = listing_page_url(&base_url, &self.profile.page_param, page);
            session.navigate(page_url.as_str()).await?;

            let links = self
                .wait
                .wait_for_elements(session, &self.profile.chapter_link)
                .await?;
            if links.is_empty() {
                tracing::debug!(page, "listing page is empty; pagination complete");
                break;
            }

            for link in links {
                let Some(href) = link.attribute("href").await? else {
                    tracing::warn!(page, "chapter link without href; skipping");
                    continue;
                };
                let resolved = resolve_chapter_url(&page_url, &href);
                chapters.push(ChapterReference {
                    source_url: resolved,
                    sequence_number: chapters.len() as u32 + 1,
                });
            }
            tracing::debug!(page, total = chapters.len(), "collected listing page");
        }

        Ok((series, chapters))
    }

    async fn resolve_series(
        &self,
        session: &mut dyn PageRenderer,
        base_url: &Url,
        output_root: &Path,
    ) -> Result<SeriesInfo, DiscoveryError> {
        session.navigate(base_url.as_str()).await?;

        let title_elements = self
            .wait
            .wait_for_elements(session, &self.profile.series_title)
            .await?;
        let Some(title_element) = title_elements.first() else {
            return Err(DiscoveryError::SeriesNotFound {
                url: base_url.to_string(),
            });
        };

        let raw_name = title_element.text().await?;
        let mut display_name = sanitize_file_name_component(raw_name.trim());
        if display_name.is_empty() {
            display_name = UNKNOWN_SERIES_NAME.to_owned();
        }

        let output_directory = output_root.join(&display_name);
        Ok(SeriesInfo {
            display_name,
            output_directory,
        })
    }
}

/// Listing page URL: the series URL with the page number query parameter set.
fn listing_page_url(base_url: &Url, page_param: &str, page: u32) -> Url {
    let mut url = base_url.clone();
    url.query_pairs_mut()
        .append_pair(page_param, &page.to_string());
    url
}

/// Chapter hrefs may be absolute or relative to the listing page.
fn resolve_chapter_url(page_url: &Url, href: &str) -> String {
    match page_url.join(href) {
        Ok(resolved) => resolved.to_string(),
        Err(err) => {
            tracing::warn!(%href, %err, "chapter href did not resolve; keeping raw value");
            href.to_owned()
        }
    }
}

/// `discover` subcommand: enumerate a series and print its chapter URLs.
pub async fn run(args: DiscoverArgs) -> anyhow::Result<()> {
    use std::io::Write as _;

    let target = crate::download::DownloadTarget::from_common_args(&args.common)?;
    let mut session = target.provision_session().await.context("provision session")?;

    let crawler =
        SeriesCrawler::new(target.profile.clone(), target.wait).with_max_pages(args.max_pages);
    let result = crawler
        .discover(session.as_mut(), &args.common.url, Path::new(&args.common.out))
        .await;
    if let Err(err) = session.close().await {
        tracing::warn!(%err, "close discovery session");
    }
    let (series, chapters) = result.context("discover series")?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "{}", series.display_name)?;
    for chapter in &chapters {
        writeln!(out, "{:>4}  {}", chapter.sequence_number, chapter.source_url)?;
    }
    tracing::info!(chapters = chapters.len(), "discovery complete");

    Ok(())
}
