use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download every chapter of a series.
    Download(DownloadArgs),
    /// Enumerate a series and print its chapter URLs without downloading.
    Discover(DiscoverArgs),
    /// Download a single chapter URL.
    Chapter(ChapterArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Target URL (series landing page, or chapter page for `chapter`).
    #[arg(long)]
    pub url: String,

    /// Cookie file: JSON array, or a browser-copied `name=value; ...` string.
    #[arg(long)]
    pub cookies: Option<String>,

    /// Cookie scope for header-string cookie files (default: derived from --url).
    #[arg(long)]
    pub cookie_domain: Option<String>,

    /// Output root directory.
    #[arg(long, default_value = ".")]
    pub out: String,

    /// Seconds to wait for a page element before giving up.
    #[arg(long, default_value_t = 10)]
    pub wait_secs: u64,

    /// Selector profile YAML overriding the built-in site selectors.
    #[arg(long)]
    pub profile: Option<String>,

    /// Chrome/Chromium executable (default: auto-detect).
    #[arg(long)]
    pub chrome: Option<String>,
}

#[derive(Debug, Args)]
pub struct DownloadArgs {
    #[command(flatten)]
    pub common: TargetArgs,

    /// Number of parallel download workers.
    #[arg(long, default_value_t = crate::download::DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// Safety valve: abort discovery after this many listing pages.
    #[arg(long, default_value_t = crate::crawl::DEFAULT_MAX_PAGES)]
    pub max_pages: u32,

    /// Write a JSON report of every chapter outcome to this path.
    #[arg(long)]
    pub report: Option<String>,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub common: TargetArgs,

    /// Safety valve: abort discovery after this many listing pages.
    #[arg(long, default_value_t = crate::crawl::DEFAULT_MAX_PAGES)]
    pub max_pages: u32,
}

#[derive(Debug, Args)]
pub struct ChapterArgs {
    #[command(flatten)]
    pub common: TargetArgs,
}
