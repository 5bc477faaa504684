//! Background work for the UI.
//!
//! The coordinator lives on the UI thread. Each start call spawns one worker
//! task on the shared runtime; workers never touch UI state and only send
//! [`UiUpdate`]s through a channel that the UI drains with [`Coordinator::poll`].
//!
//! Cancellation is advisory: yt-dlp and the search API cannot be interrupted,
//! so a cancelled worker keeps running until its current call returns and
//! then drops whatever it got.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::{
    runtime::Handle,
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    downloader::{DownloadRequest, MediaDownloader, Playlist},
    error::{AppError, Result},
    model::{Job, JobTarget, MediaMode, OperationKind, OperationState, SearchQuery, SearchResult},
    progress::ProgressEvent,
    search::VideoSearch,
    utils::sanitize_filename,
};

/// A change the UI should apply
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Percentage in `0.0..=100.0`
    Progress { kind: OperationKind, percent: f32 },
    Status { kind: OperationKind, text: String },
    Log { kind: OperationKind, line: String },
    SearchResults(Vec<SearchResult>),
    /// The worker is done; the kind is idle again
    Finished(OperationKind),
}

struct WorkerMessage {
    kind: OperationKind,
    generation: u64,
    update: UiUpdate,
}

/// Flag shared between the coordinator and one worker run
#[derive(Debug, Clone)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn cancel(&self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct Slot {
    state: OperationState,
    generation: u64,
    token: Option<CancelToken>,
}

/// Worker-side handle for sending updates of one run.
///
/// Everything except [`Reporter::finish`] is silently dropped once the run
/// has been cancelled.
struct Reporter {
    kind: OperationKind,
    generation: u64,
    token: CancelToken,
    tx: UnboundedSender<WorkerMessage>,
}

impl Reporter {
    fn is_active(&self) -> bool {
        self.token.is_active()
    }

    fn send(&self, update: UiUpdate) {
        // The receiver only goes away when the app is closing.
        let _ = self.tx.send(WorkerMessage {
            kind: self.kind,
            generation: self.generation,
            update,
        });
    }

    fn send_if_active(&self, update: UiUpdate) {
        if self.is_active() {
            self.send(update);
        }
    }

    fn progress(&self, percent: f32) {
        self.send_if_active(UiUpdate::Progress {
            kind: self.kind,
            percent,
        });
    }

    fn status(&self, text: impl Into<String>) {
        self.send_if_active(UiUpdate::Status {
            kind: self.kind,
            text: text.into(),
        });
    }

    fn log(&self, line: impl Into<String>) {
        self.send_if_active(UiUpdate::Log {
            kind: self.kind,
            line: line.into(),
        });
    }

    fn fail(&self, context: &str, err: &AppError) {
        if self.is_active() {
            warn!(kind = %self.kind, "{}: {}", context, err);
        } else {
            debug!(kind = %self.kind, "suppressed error after cancel: {}", err);
        }
        self.status(format!("Error: {}", err));
        self.log(format!("{}: {}", context, err));
    }

    fn finish(&self) {
        self.send(UiUpdate::Finished(self.kind));
    }
}

pub struct Coordinator {
    runtime: Handle,
    downloader: Arc<dyn MediaDownloader>,
    searcher: Arc<dyn VideoSearch>,
    tx: UnboundedSender<WorkerMessage>,
    rx: UnboundedReceiver<WorkerMessage>,
    slots: [Slot; 3],
    next_generation: u64,
    workers: Vec<JoinHandle<()>>,
}

impl Coordinator {
    pub fn new(
        runtime: Handle,
        downloader: Arc<dyn MediaDownloader>,
        searcher: Arc<dyn VideoSearch>,
    ) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            runtime,
            downloader,
            searcher,
            tx,
            rx,
            slots: Default::default(),
            next_generation: 0,
            workers: Vec::new(),
        }
    }

    /// Swaps the search backend, e.g. after the API key changed.
    /// A search already running keeps its old backend.
    pub fn set_searcher(&mut self, searcher: Arc<dyn VideoSearch>) {
        self.searcher = searcher;
    }

    pub fn state(&self, kind: OperationKind) -> OperationState {
        self.slots[kind.index()].state
    }

    pub fn is_running(&self, kind: OperationKind) -> bool {
        self.state(kind) == OperationState::Running
    }

    pub fn any_running(&self) -> bool {
        OperationKind::ALL.iter().any(|kind| self.is_running(*kind))
    }

    fn begin(&mut self, kind: OperationKind) -> Result<Reporter> {
        let slot = &mut self.slots[kind.index()];
        if slot.state == OperationState::Running {
            return Err(AppError::Busy(kind));
        }
        // Fresh generation and token; anything tagged with an older one is stale
        self.next_generation += 1;
        let token = CancelToken::new();
        slot.state = OperationState::Running;
        slot.generation = self.next_generation;
        slot.token = Some(token.clone());
        Ok(Reporter {
            kind,
            generation: self.next_generation,
            token,
            tx: self.tx.clone(),
        })
    }

    fn spawn<F>(&mut self, worker: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        // Forget finished handles so the list does not grow without bound
        self.workers.retain(|handle| !handle.is_finished());
        self.workers.push(self.runtime.spawn(worker));
    }

    /// Downloads a single URL or a batch of URLs on a new worker.
    pub fn start_job(&mut self, job: Job) -> Result<()> {
        if let JobTarget::Single(url) = &job.target {
            if url.trim().is_empty() {
                return Err(AppError::EmptyInput("a video URL"));
            }
        }
        let reporter = self.begin(OperationKind::Download)?;
        let downloader = Arc::clone(&self.downloader);
        info!(job = ?job.target, mode = ?job.mode, destination = %job.destination.display(), "starting download");
        self.spawn(async move {
            run_job(downloader.as_ref(), job, &reporter).await;
            reporter.finish();
        });
        Ok(())
    }

    /// Writes every entry URL of a playlist to `<destination>/<title>.txt`.
    pub fn start_playlist_extraction(&mut self, url: String, destination: PathBuf) -> Result<()> {
        if url.trim().is_empty() {
            return Err(AppError::EmptyInput("a playlist URL"));
        }
        let reporter = self.begin(OperationKind::Extract)?;
        let downloader = Arc::clone(&self.downloader);
        info!(%url, "starting playlist extraction");
        self.spawn(async move {
            run_extraction(downloader.as_ref(), url.trim(), &destination, &reporter).await;
            reporter.finish();
        });
        Ok(())
    }

    pub fn start_search(&mut self, query: SearchQuery) -> Result<()> {
        if query.keywords.trim().is_empty() {
            return Err(AppError::EmptyInput("search keywords"));
        }
        let reporter = self.begin(OperationKind::Search)?;
        let searcher = Arc::clone(&self.searcher);
        info!(query = %query.query_text(), language = %query.language, "starting search");
        self.spawn(async move {
            run_search(searcher.as_ref(), &query, &reporter).await;
            reporter.finish();
        });
        Ok(())
    }

    /// Returns `false` if nothing of that kind was running.
    pub fn cancel(&mut self, kind: OperationKind) -> bool {
        let slot = &mut self.slots[kind.index()];
        if slot.state != OperationState::Running {
            return false;
        }
        // The worker notices at its next checkpoint; poll drops what is already queued
        if let Some(token) = slot.token.take() {
            token.cancel();
        }
        slot.state = OperationState::Idle;
        info!(%kind, "cancelled");
        true
    }

    pub fn cancel_all(&mut self) {
        for kind in OperationKind::ALL {
            self.cancel(kind);
        }
    }

    /// Drains pending worker messages. Call from the UI thread only.
    pub fn poll(&mut self) -> Vec<UiUpdate> {
        let mut updates = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            let slot = &mut self.slots[message.kind.index()];
            if slot.generation != message.generation || slot.state != OperationState::Running {
                debug!(kind = %message.kind, "dropping update from cancelled run");
                continue;
            }
            // Finished frees the slot for the next start
            if let UiUpdate::Finished(_) = message.update {
                slot.state = OperationState::Idle;
                slot.token = None;
            }
            updates.push(message.update);
        }
        updates
    }

    #[cfg(test)]
    async fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }
}

fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

async fn run_job(downloader: &dyn MediaDownloader, job: Job, reporter: &Reporter) {
    if let Err(err) = ensure_dir(&job.destination) {
        reporter.fail(
            &format!("Cannot create {}", job.destination.display()),
            &err,
        );
        return;
    }
    match job.target {
        JobTarget::Single(url) => {
            download_one(downloader, url.trim(), job.mode, &job.destination, reporter).await
        }
        JobTarget::Batch(urls) => {
            download_batch(downloader, &urls, job.mode, &job.destination, reporter).await
        }
    }
}

async fn download_one(
    downloader: &dyn MediaDownloader,
    url: &str,
    mode: MediaMode,
    destination: &Path,
    reporter: &Reporter,
) {
    reporter.status("Starting download...");
    let request = DownloadRequest::new(url, mode, destination);
    let mut on_progress = |event: ProgressEvent| match event {
        ProgressEvent::Downloading { percent } => {
            reporter.progress(percent);
            reporter.status(format!("Downloading: {:.1}%", percent));
        }
        ProgressEvent::Finished => {
            reporter.progress(100.0);
            reporter.status(match mode {
                MediaMode::Audio => "Download finished, converting...",
                MediaMode::Video => "Download finished, merging...",
            });
        }
    };
    let result = downloader.download(&request, &mut on_progress).await;

    // Checkpoint: a cancelled run reports neither success nor failure
    if !reporter.is_active() {
        debug!(%url, "download returned after cancel, discarding");
        return;
    }
    match result {
        Ok(media) => {
            info!(%url, title = %media.title, "download complete");
            reporter.log(format!("✓ Downloaded: {}.{}", media.title, mode.extension()));
        }
        Err(err) => reporter.fail(&format!("Error downloading {}", url), &err),
    }
}

// Batch items report only coarse per-item status; percentages within an
// item are not forwarded.
async fn download_batch(
    downloader: &dyn MediaDownloader,
    urls: &[String],
    mode: MediaMode,
    destination: &Path,
    reporter: &Reporter,
) {
    let total = urls.len();
    let mut completed = 0usize;

    for (i, url) in urls.iter().enumerate() {
        // Checkpoint between items
        if !reporter.is_active() {
            break;
        }
        reporter.status(format!("Downloading {}/{}", i + 1, total));
        reporter.progress(i as f32 / total as f32 * 100.0);

        let request = DownloadRequest::new(url.as_str(), mode, destination);
        let result = downloader.download(&request, &mut |_: ProgressEvent| {}).await;
        if !reporter.is_active() {
            debug!(%url, "batch cancelled, discarding item result");
            break;
        }
        match result {
            Ok(media) => {
                completed += 1;
                reporter.log(format!(
                    "✓ [{}/{}] {}.{}",
                    i + 1,
                    total,
                    media.title,
                    mode.extension()
                ));
            }
            // A failed item is logged and the batch moves on
            Err(err) => {
                warn!(%url, "batch item failed: {}", err);
                reporter.log(format!("✗ [{}/{}] Error downloading {}: {}", i + 1, total, url, err));
            }
        }
    }

    if reporter.is_active() {
        info!(completed, total, "batch finished");
        reporter.progress(100.0);
        reporter.status(format!("{} of {} items complete", completed, total));
        reporter.log(format!("Batch finished: {} of {} items complete", completed, total));
    }
}

/// Writes one URL per line and returns the file path.
pub fn write_playlist_file(destination: &Path, playlist: &Playlist) -> Result<PathBuf> {
    ensure_dir(destination)?;
    let path = destination.join(format!("{}.txt", sanitize_filename(&playlist.title)));
    let mut content = playlist.entries.join("\n");
    content.push('\n');
    fs::write(&path, content)?;
    Ok(path)
}

async fn run_extraction(
    downloader: &dyn MediaDownloader,
    url: &str,
    destination: &Path,
    reporter: &Reporter,
) {
    reporter.status("Extracting playlist...");
    let result = downloader.extract_playlist(url).await;
    if !reporter.is_active() {
        debug!(%url, "extraction returned after cancel, discarding");
        return;
    }

    // Only a live run writes the file
    let outcome = result.and_then(|playlist| {
        write_playlist_file(destination, &playlist).map(|path| (playlist, path))
    });
    match outcome {
        Ok((playlist, path)) => {
            info!(count = playlist.entries.len(), path = %path.display(), "playlist saved");
            reporter.status(format!("Extracted {} URLs", playlist.entries.len()));
            reporter.log(format!(
                "✓ Saved {} URLs from \"{}\" to {}",
                playlist.entries.len(),
                playlist.title,
                path.display()
            ));
        }
        Err(err) => reporter.fail(&format!("Error extracting playlist {}", url), &err),
    }
}

async fn run_search(searcher: &dyn VideoSearch, query: &SearchQuery, reporter: &Reporter) {
    reporter.status(format!("Searching: {}", query.query_text()));
    let result = searcher.search(query).await;
    if !reporter.is_active() {
        debug!("search returned after cancel, discarding");
        return;
    }
    match result {
        Ok(results) if results.is_empty() => reporter.fail("Search", &AppError::NoResults),
        Ok(results) => {
            info!(count = results.len(), "search complete");
            reporter.status(format!("Found {} videos", results.len()));
            reporter.send_if_active(UiUpdate::SearchResults(results));
        }
        Err(err) => reporter.fail("Search failed", &err),
    }
}
