use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::classifier::{classify, ClipboardContent};
use super::events::{CaptureEvent, CaptureListener};
use super::format::ImageFormat;
use super::ignore::IgnorePolicy;
use super::item::{ClipboardItem, ImageRef, ItemKind, PREVIEW_CHARS};
use super::pasteboard::{FrontmostApp, Pasteboard, SourceApp};
use crate::config::Settings;
use crate::error::StoreError;
use crate::storage::blobs::ContentStore;
use crate::storage::database::HistoryRepository;

/// What a single poll did. Returned by [`ClipboardMonitor::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Change counter did not move.
    Unchanged,
    /// Our own paste; fingerprint refreshed, nothing captured.
    Suppressed,
    /// Monitoring paused; fingerprint refreshed, nothing captured.
    Paused,
    /// Source app or pasteboard type is on a block-list.
    Ignored,
    Unsupported,
    /// Counter moved but the content is what we saw last.
    SameContent,
    /// New to this tick, but already in history.
    Duplicate,
    Captured(ItemKind),
    SkippedTooLarge,
    Failed,
}

#[derive(Debug, Default)]
struct MonitorState {
    last_change_count: i64,
    last_hash: Option<String>,
    suppress_until: Option<Instant>,
}

struct Worker {
    stop: Arc<AtomicBool>,
    _handle: JoinHandle<()>,
}

/// Polls the pasteboard and feeds new content into history.
///
/// Ticks are strictly sequential: the polling thread and direct callers of
/// [`tick`](Self::tick) serialise on the same state lock.
pub struct ClipboardMonitor {
    pasteboard: Arc<dyn Pasteboard>,
    frontmost: Arc<dyn FrontmostApp>,
    history: Arc<HistoryRepository>,
    store: Arc<ContentStore>,
    listener: Arc<dyn CaptureListener>,
    policy: RwLock<IgnorePolicy>,
    poll_interval_ms: AtomicU64,
    paused: AtomicBool,
    state: Mutex<MonitorState>,
    worker: Mutex<Option<Worker>>,
}

impl ClipboardMonitor {
    pub fn new(
        pasteboard: Arc<dyn Pasteboard>,
        frontmost: Arc<dyn FrontmostApp>,
        history: Arc<HistoryRepository>,
        store: Arc<ContentStore>,
        listener: Arc<dyn CaptureListener>,
        settings: &Settings,
    ) -> Self {
        Self {
            pasteboard,
            frontmost,
            history,
            store,
            listener,
            policy: RwLock::new(IgnorePolicy::from_settings(settings)),
            poll_interval_ms: AtomicU64::new(settings.poll_interval().as_millis() as u64),
            paused: AtomicBool::new(false),
            state: Mutex::new(MonitorState::default()),
            worker: Mutex::new(None),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn apply_settings(&self, settings: &Settings) {
        *self.policy.write().unwrap_or_else(|e| e.into_inner()) =
            IgnorePolicy::from_settings(settings);
        self.poll_interval_ms
            .store(settings.poll_interval().as_millis() as u64, Ordering::Relaxed);
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.load(Ordering::Relaxed).max(1))
    }

    pub fn is_running(&self) -> bool {
        self.lock_worker().is_some()
    }

    /// Begin polling on a background thread. No-op when already running.
    pub fn start(self: &Arc<Self>) {
        let mut worker = self.lock_worker();
        if worker.is_some() {
            debug!("Monitor already running");
            return;
        }

        self.prime();

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let monitor: Weak<Self> = Arc::downgrade(self);

        let spawned = thread::Builder::new()
            .name("clipshelf-monitor".to_string())
            .spawn(move || poll_loop(monitor, thread_stop));

        match spawned {
            Ok(handle) => {
                *worker = Some(Worker {
                    stop,
                    _handle: handle,
                });
                info!(
                    "Monitor started (interval {}ms)",
                    self.poll_interval().as_millis()
                );
            }
            Err(e) => error!("Failed to spawn monitor thread: {}", e),
        }
    }

    /// Stop polling. A tick already in progress finishes; no-op when stopped.
    pub fn stop(&self) {
        if let Some(worker) = self.lock_worker().take() {
            worker.stop.store(true, Ordering::Relaxed);
            info!("Monitor stopped");
        }
    }

    /// Record the current pasteboard as already seen, without capturing it.
    pub fn prime(&self) {
        let mut state = self.lock_state();
        state.last_change_count = self.pasteboard.change_count();
        state.last_hash = classify(&*self.pasteboard).map(|c| c.fingerprint());
        if state.last_hash.is_some() {
            info!("Existing clipboard content recorded (not saved)");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    pub fn toggle_pause(&self) -> bool {
        let now_paused = !self.paused.fetch_xor(true, Ordering::Relaxed);
        info!(
            "Monitoring {}",
            if now_paused { "paused" } else { "resumed" }
        );
        now_paused
    }

    /// Treat every clipboard change during the next `duration` as our own
    /// write. Issued by the paste path before it touches the pasteboard.
    pub fn suspend_capture(&self, duration: Duration) {
        let until = Instant::now() + duration;
        let mut state = self.lock_state();
        state.suppress_until = Some(match state.suppress_until {
            Some(current) if current > until => current,
            _ => until,
        });
    }

    pub fn resume_capture(&self) {
        self.lock_state().suppress_until = None;
    }

    pub fn is_capture_suspended(&self) -> bool {
        self.lock_state()
            .suppress_until
            .is_some_and(|until| Instant::now() < until)
    }

    /// Fingerprint of the last content the monitor considered seen.
    pub fn last_fingerprint(&self) -> Option<String> {
        self.lock_state().last_hash.clone()
    }

    /// One poll. Cheap when the change counter has not moved.
    pub fn tick(&self) -> TickOutcome {
        let mut state = self.lock_state();

        let change_count = self.pasteboard.change_count();
        if change_count == state.last_change_count {
            return TickOutcome::Unchanged;
        }
        // Record first so a failure below never reprocesses this change.
        state.last_change_count = change_count;

        if suppression_active(&mut state) {
            debug!("Clipboard changed by our own paste, skipping capture");
            self.refresh_fingerprint(&mut state);
            return TickOutcome::Suppressed;
        }

        if self.is_paused() {
            self.refresh_fingerprint(&mut state);
            return TickOutcome::Paused;
        }

        let app = self.frontmost.frontmost_app();
        let types = self.pasteboard.types();
        let ignored = self
            .policy
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .should_ignore(app.as_ref(), &types);
        if ignored {
            self.refresh_fingerprint(&mut state);
            return TickOutcome::Ignored;
        }

        let Some(content) = classify(&*self.pasteboard) else {
            return TickOutcome::Unsupported;
        };

        let hash = content.fingerprint();
        if state.last_hash.as_deref() == Some(hash.as_str()) {
            return TickOutcome::SameContent;
        }
        state.last_hash = Some(hash.clone());

        match content {
            ClipboardContent::Text(text) => self.capture_text(text, app),
            ClipboardContent::Image { bytes, format } => {
                self.capture_image(&bytes, format, &hash, app)
            }
        }
    }

    fn refresh_fingerprint(&self, state: &mut MonitorState) {
        if let Some(content) = classify(&*self.pasteboard) {
            state.last_hash = Some(content.fingerprint());
        }
    }

    fn capture_text(&self, text: String, app: Option<SourceApp>) -> TickOutcome {
        let item = ClipboardItem::text(text, app);

        match self.history.insert_if_new(&item) {
            Ok(true) => {
                info!(
                    "Captured text: id={} hash={}.. len={}",
                    item.id,
                    &item.content_hash[..12],
                    item.text_content().map_or(0, str::len)
                );
                self.listener.on_capture(CaptureEvent::TextCaptured {
                    text: item.text_content().unwrap_or_default().to_string(),
                    preview: item.preview(PREVIEW_CHARS),
                });
                TickOutcome::Captured(ItemKind::Text)
            }
            Ok(false) => TickOutcome::Duplicate,
            Err(e) => {
                error!("Failed to persist text item: {}", e);
                TickOutcome::Failed
            }
        }
    }

    fn capture_image(
        &self,
        bytes: &[u8],
        format: ImageFormat,
        hash: &str,
        app: Option<SourceApp>,
    ) -> TickOutcome {
        match self.history.contains_hash(hash) {
            Ok(true) => {
                debug!("Image {}.. already in history", &hash[..12]);
                return TickOutcome::Duplicate;
            }
            Ok(false) => {}
            Err(e) => warn!("Duplicate check failed, storing anyway: {}", e),
        }

        let blob = match self.store.put(bytes, format) {
            Ok(blob) => blob,
            Err(StoreError::PayloadTooLarge { size, limit }) => {
                info!("Skipped {} image of {} bytes (limit {})", format, size, limit);
                self.listener
                    .on_capture(CaptureEvent::SkippedTooLarge { size, limit });
                return TickOutcome::SkippedTooLarge;
            }
            Err(e) => {
                error!("Failed to store image: {}", e);
                return TickOutcome::Failed;
            }
        };

        // An identical payload may already be on disk under another format.
        let (width, height, format) = (blob.width, blob.height, blob.format);
        let item = ClipboardItem::image(
            ImageRef {
                path: blob.path.clone(),
                width,
                height,
                format,
            },
            blob.hash,
            app,
        );

        match self.history.insert_if_new(&item) {
            Ok(true) => {
                info!(
                    "Captured {} image {}x{}: id={}",
                    format, width, height, item.id
                );
                self.listener.on_capture(CaptureEvent::ImageCaptured {
                    format,
                    width,
                    height,
                });
                TickOutcome::Captured(ItemKind::Image)
            }
            Ok(false) => TickOutcome::Duplicate,
            Err(e) => {
                error!("Failed to persist image item: {}", e);
                self.store.delete(&blob.path);
                TickOutcome::Failed
            }
        }
    }
}

impl Drop for ClipboardMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn suppression_active(state: &mut MonitorState) -> bool {
    match state.suppress_until {
        Some(until) if Instant::now() < until => true,
        Some(_) => {
            state.suppress_until = None;
            false
        }
        None => false,
    }
}

fn poll_loop(monitor: Weak<ClipboardMonitor>, stop: Arc<AtomicBool>) {
    loop {
        let Some(interval) = monitor.upgrade().map(|m| m.poll_interval()) else {
            break;
        };
        thread::sleep(interval);

        if stop.load(Ordering::Relaxed) {
            break;
        }
        let Some(monitor) = monitor.upgrade() else {
            break;
        };
        let outcome = monitor.tick();
        if outcome != TickOutcome::Unchanged {
            debug!("Tick: {:?}", outcome);
        }
    }
    debug!("Monitor thread exiting");
}
