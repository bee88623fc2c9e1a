use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::assemble::{assemble, assemble_standalone};
use crate::browser::{BrowserOptions, HeadlessBrowserFactory};
use crate::cli::{ChapterArgs, DownloadArgs, TargetArgs};
use crate::crawl::{DiscoveryError, SeriesCrawler};
use crate::credentials::{SessionCredentials, default_cookie_domain};
use crate::extract::{ChapterExtractor, ExtractionError};
use crate::formats::{ChapterReference, DownloadOutcome, OutcomeStatus, RunReport, RunStatus};
use crate::renderer::{
    PageRenderer, RendererError, RendererFactory, WaitPolicy, provision_session,
};
use crate::sink::{DocumentSink, MarkdownSink, SinkError};
use crate::site::SiteProfile;

pub const DEFAULT_WORKER_COUNT: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
    #[error("create series directory {path}: {source}")]
    OutputDir {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Receives one call per finished chapter.
///
/// The coordinator's aggregation loop serializes invocations, so `completed`
/// advances by exactly one per call regardless of worker completion order.
pub trait ProgressObserver: Send + Sync {
    fn chapter_finished(&self, completed: usize, total: usize, outcome: &DownloadOutcome);
}

#[derive(Debug, Clone)]
pub struct DownloadOptions {
    pub worker_count: usize,
    pub output_root: PathBuf,
    pub wait: WaitPolicy,
    pub max_pages: u32,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            output_root: PathBuf::from("."),
            wait: WaitPolicy::default(),
            max_pages: crate::crawl::DEFAULT_MAX_PAGES,
        }
    }
}

/// Owns the worker pool for a series run.
///
/// Discovery runs once on its own session ahead of the pool. Chapters are then
/// fanned out over a task queue to `worker_count` workers; every worker-chapter
/// unit provisions a fresh renderer session, owns it exclusively, and releases
/// it before reporting its outcome. Outcomes flow back over a channel, which is
/// the only cross-worker synchronization besides the queue itself.
pub struct DownloadCoordinator {
    factory: Arc<dyn RendererFactory>,
    sink: Arc<dyn DocumentSink>,
    crawler: SeriesCrawler,
    extractor: ChapterExtractor,
    worker_count: usize,
    output_root: PathBuf,
    progress: Option<Arc<dyn ProgressObserver>>,
    cancel: CancellationToken,
}

impl DownloadCoordinator {
    pub fn new(
        factory: Arc<dyn RendererFactory>,
        sink: Arc<dyn DocumentSink>,
        profile: SiteProfile,
        options: DownloadOptions,
    ) -> Self {
        Self {
            factory,
            sink,
            crawler: SeriesCrawler::new(profile.clone(), options.wait)
                .with_max_pages(options.max_pages),
            extractor: ChapterExtractor::new(profile, options.wait),
            worker_count: options.worker_count.max(1),
            output_root: options.output_root,
            progress: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }

    /// Use a caller-owned cancellation token instead of the internal one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle for requesting a stop: no further chapters are handed to
    /// workers, while in-flight chapters run to completion.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Download a whole series.
    ///
    /// Discovery failures abort the run; per-chapter failures are recorded in
    /// the report and never propagate to sibling workers.
    pub async fn run(
        &self,
        series_url: &str,
        credentials: &SessionCredentials,
    ) -> Result<RunReport, DownloadError> {
        let mut discovery = provision_session(self.factory.as_ref(), credentials).await?;
        let discovered = self
            .crawler
            .discover(discovery.as_mut(), series_url, &self.output_root)
            .await;
        if let Err(err) = discovery.close().await {
            tracing::warn!(%err, "close discovery session");
        }
        let (series, chapters) = discovered?;

        tokio::fs::create_dir_all(&series.output_directory)
            .await
            .map_err(|source| DownloadError::OutputDir {
                path: series.output_directory.display().to_string(),
                source,
            })?;

        let total = chapters.len();
        if total == 0 {
            tracing::warn!(series = %series.display_name, "series has no chapters");
            return Ok(RunReport {
                series,
                total,
                outcomes: Vec::new(),
                cancelled: self.cancel.is_cancelled(),
                generated_at: chrono::Utc::now().to_rfc3339(),
            });
        }
        tracing::info!(series = %series.display_name, chapters = total, "starting downloads");

        let worker_count = self.worker_count.min(total);

        // Task queue in, outcome channel out. The queue is sized to hold every
        // chapter up front; workers stop pulling from it once cancelled.
        let (job_tx, job_rx) = mpsc::channel::<ChapterReference>(total);
        for chapter in chapters {
            job_tx
                .try_send(chapter)
                .expect("job queue is sized to the chapter count");
        }
        drop(job_tx);
        let job_rx = Arc::new(Mutex::new(job_rx));

        let (outcome_tx, mut outcome_rx) = mpsc::channel::<DownloadOutcome>(worker_count);

        let ctx = Arc::new(WorkerContext {
            factory: Arc::clone(&self.factory),
            sink: Arc::clone(&self.sink),
            extractor: self.extractor.clone(),
            credentials: credentials.clone(),
            output_directory: series.output_directory.clone(),
            cancel: self.cancel.clone(),
        });

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                worker_id,
                Arc::clone(&job_rx),
                outcome_tx.clone(),
                Arc::clone(&ctx),
            )));
        }
        drop(outcome_tx);

        // Single consumer: outcome order is completion order, and the running
        // count advances by exactly one per outcome.
        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = outcome_rx.recv().await {
            let completed = outcomes.len() + 1;
            if let Some(observer) = &self.progress {
                observer.chapter_finished(completed, total, &outcome);
            }
            outcomes.push(outcome);
        }

        for worker in workers {
            if let Err(err) = worker.await {
                tracing::error!(%err, "download worker panicked");
            }
        }

        let report = RunReport {
            series,
            total,
            outcomes,
            cancelled: self.cancel.is_cancelled(),
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        log_run_summary(&report);
        Ok(report)
    }
}

struct WorkerContext {
    factory: Arc<dyn RendererFactory>,
    sink: Arc<dyn DocumentSink>,
    extractor: ChapterExtractor,
    credentials: SessionCredentials,
    output_directory: PathBuf,
    cancel: CancellationToken,
}

#[derive(Debug, thiserror::Error)]
enum ChapterError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Write(#[from] SinkError),
}

async fn worker_loop(
    worker_id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<ChapterReference>>>,
    outcomes: mpsc::Sender<DownloadOutcome>,
    ctx: Arc<WorkerContext>,
) {
    loop {
        if ctx.cancel.is_cancelled() {
            tracing::debug!(worker_id, "cancelled; worker stopping");
            break;
        }
        let next = { jobs.lock().await.recv().await };
        let Some(chapter) = next else {
            break;
        };
        tracing::debug!(worker_id, chapter = chapter.sequence_number, "chapter assigned");
        let outcome = process_chapter(&ctx, &chapter).await;
        if outcomes.send(outcome).await.is_err() {
            break;
        }
    }
}

/// Run one chapter to a terminal outcome. Never returns an error: failures
/// are folded into the outcome so they stay isolated to this chapter.
async fn process_chapter(ctx: &WorkerContext, chapter: &ChapterReference) -> DownloadOutcome {
    let mut session = match provision_session(ctx.factory.as_ref(), &ctx.credentials).await {
        Ok(session) => session,
        Err(err) => {
            tracing::warn!(chapter = chapter.sequence_number, %err, "session provisioning failed");
            return DownloadOutcome::failed(
                chapter.clone(),
                OutcomeStatus::SessionFailed,
                err.to_string(),
            );
        }
    };

    let result = download_chapter(ctx, session.as_mut(), chapter).await;

    // Release the session on every path, or browser processes pile up over a
    // long series.
    if let Err(err) = session.close().await {
        tracing::warn!(chapter = chapter.sequence_number, %err, "close renderer session");
    }

    match result {
        Ok(path) => {
            tracing::info!(
                chapter = chapter.sequence_number,
                path = %path.display(),
                "chapter written"
            );
            DownloadOutcome::succeeded(chapter.clone())
        }
        Err(err) => {
            let status = match &err {
                ChapterError::Extraction(_) => OutcomeStatus::ExtractionFailed,
                ChapterError::Write(_) => OutcomeStatus::WriteFailed,
            };
            tracing::warn!(chapter = chapter.sequence_number, %err, "chapter failed");
            DownloadOutcome::failed(chapter.clone(), status, err.to_string())
        }
    }
}

async fn download_chapter(
    ctx: &WorkerContext,
    session: &mut dyn PageRenderer,
    chapter: &ChapterReference,
) -> Result<PathBuf, ChapterError> {
    let content = ctx.extractor.extract(session, chapter).await?;
    let (payload, file_name) = assemble(&content.title, &content.paragraphs, chapter.sequence_number);
    let path = ctx.output_directory.join(file_name);
    ctx.sink.write(&payload, &path).await?;
    Ok(path)
}

fn log_run_summary(report: &RunReport) {
    match report.status() {
        RunStatus::AllSucceeded => {
            tracing::info!(chapters = report.total, "all chapters downloaded");
        }
        RunStatus::PartialFailure => {
            tracing::warn!(
                failed = report.failures().len(),
                attempted = report.outcomes.len(),
                total = report.total,
                "run finished with failures"
            );
        }
        RunStatus::AllFailed => {
            tracing::warn!(
                total = report.total,
                "no chapter succeeded; this usually means a systemic cause such as expired credentials"
            );
        }
    }

    // A failure kind that dominates the run points at a shared cause rather
    // than per-chapter flakiness.
    for (status, label) in [
        (OutcomeStatus::WriteFailed, "document write"),
        (OutcomeStatus::SessionFailed, "session provisioning"),
    ] {
        let count = report
            .outcomes
            .iter()
            .filter(|o| o.status == status)
            .count();
        if count > 1 && count * 2 >= report.total {
            tracing::warn!(count, total = report.total, kind = label, "repeated failures of one kind");
        }
    }
}

/// CLI wiring shared by the `download`, `discover` and `chapter` commands.
pub struct DownloadTarget {
    pub profile: SiteProfile,
    pub wait: WaitPolicy,
    pub factory: Arc<dyn RendererFactory>,
    pub credentials: SessionCredentials,
}

impl DownloadTarget {
    pub fn from_common_args(args: &TargetArgs) -> anyhow::Result<Self> {
        let url = Url::parse(&args.url).context("parse --url")?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("--url must be http/https: {url}");
        }

        let profile =
            SiteProfile::load(args.profile.as_deref().map(Path::new)).context("load site profile")?;

        let credentials = match &args.cookies {
            Some(path) => {
                let domain = match &args.cookie_domain {
                    Some(domain) => domain.clone(),
                    None => default_cookie_domain(&url)?,
                };
                SessionCredentials::load(Path::new(path), &domain).context("load cookies")?
            }
            None => {
                tracing::warn!("no cookie file given; fetching without credentials");
                SessionCredentials::empty()
            }
        };

        let factory = HeadlessBrowserFactory::new(BrowserOptions {
            chrome_executable: args.chrome.clone().map(PathBuf::from),
            ..BrowserOptions::default()
        });

        Ok(Self {
            profile,
            wait: WaitPolicy::new(Duration::from_secs(args.wait_secs.max(1))),
            factory: Arc::new(factory),
            credentials,
        })
    }

    pub async fn provision_session(&self) -> Result<Box<dyn PageRenderer>, RendererError> {
        provision_session(self.factory.as_ref(), &self.credentials).await
    }
}

/// Logs each finished chapter as a progress line.
struct LogProgress;

impl ProgressObserver for LogProgress {
    fn chapter_finished(&self, completed: usize, total: usize, outcome: &DownloadOutcome) {
        tracing::info!(
            completed,
            total,
            chapter = outcome.chapter.sequence_number,
            status = ?outcome.status,
            "progress"
        );
    }
}

/// `download` subcommand: full series run.
pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let target = DownloadTarget::from_common_args(&args.common)?;

    let options = DownloadOptions {
        worker_count: args.workers.max(1),
        output_root: PathBuf::from(&args.common.out),
        wait: target.wait,
        max_pages: args.max_pages,
    };
    let coordinator = DownloadCoordinator::new(
        Arc::clone(&target.factory),
        Arc::new(MarkdownSink),
        target.profile.clone(),
        options,
    )
    .with_progress(Arc::new(LogProgress));

    let cancel = coordinator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; letting in-flight chapters finish");
            cancel.cancel();
        }
    });

    let report = coordinator
        .run(&args.common.url, &target.credentials)
        .await
        .context("download series")?;

    for failure in report.failures() {
        tracing::warn!(
            chapter = failure.chapter.sequence_number,
            url = %failure.chapter.source_url,
            detail = failure.error_detail.as_deref().unwrap_or_default(),
            "failed chapter"
        );
    }

    if let Some(report_path) = &args.report {
        write_report(&report, Path::new(report_path))?;
    }

    if report.total > 0 && report.status() == RunStatus::AllFailed {
        anyhow::bail!("no chapter succeeded out of {}", report.total);
    }
    Ok(())
}

fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    std::fs::write(path, json).with_context(|| format!("write run report: {}", path.display()))?;
    tracing::info!(path = %path.display(), "run report written");
    Ok(())
}

/// `chapter` subcommand: fetch a single chapter URL with no series context.
pub async fn run_chapter(args: ChapterArgs) -> anyhow::Result<()> {
    let target = DownloadTarget::from_common_args(&args.common)?;
    let extractor = ChapterExtractor::new(target.profile.clone(), target.wait);

    let output_root = PathBuf::from(&args.common.out);
    tokio::fs::create_dir_all(&output_root)
        .await
        .with_context(|| format!("create output directory: {}", output_root.display()))?;

    let mut session = target.provision_session().await.context("provision session")?;
    let chapter = ChapterReference {
        source_url: args.common.url.clone(),
        sequence_number: 1,
    };
    let result = extractor.extract(session.as_mut(), &chapter).await;
    if let Err(err) = session.close().await {
        tracing::warn!(%err, "close renderer session");
    }
    let content = result.context("extract chapter")?;

    let (payload, file_name) = assemble_standalone(&content.title, &content.paragraphs);
    let path = output_root.join(file_name);
    MarkdownSink.write(&payload, &path).await.context("write document")?;
    tracing::info!(path = %path.display(), "chapter written");

    Ok(())
}
