//! Clipboard history: polls the pasteboard, classifies and deduplicates what
//! the user copies, stores images content-addressed on disk, keeps a bounded
//! history in SQLite, and pastes items back without recording the echo.
//!
//! [`Clipshelf`] wires the pieces together. Platform access (pasteboard,
//! frontmost app, keystroke synthesis) is injected through the traits in
//! [`clipboard::pasteboard`] and [`clipboard::paste`].

pub mod clipboard;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use log::{info, warn};

pub use clipboard::events::{CaptureEvent, CaptureListener, NoopListener};
pub use clipboard::format::ImageFormat;
pub use clipboard::item::{ClipboardItem, ImageRef, ItemContent, ItemKind};
pub use clipboard::monitor::{ClipboardMonitor, TickOutcome};
pub use clipboard::paste::{CopyOnly, KeystrokeInjector, PasteOutcome, Paster};
pub use clipboard::pasteboard::{
    FrontmostApp, MemoryFrontmost, MemoryPasteboard, Pasteboard, PasteboardEntry, SourceApp,
};
pub use config::Settings;
pub use error::{Error, HistoryError, Result, StoreError};
pub use storage::blobs::ContentStore;
pub use storage::database::{AppUsage, HistoryQuery, HistoryRepository, SourceFilter};

const IMAGES_DIR: &str = "images";

/// Host-provided platform access.
pub struct Platform {
    pub pasteboard: Arc<dyn Pasteboard>,
    pub frontmost: Arc<dyn FrontmostApp>,
    pub injector: Arc<dyn KeystrokeInjector>,
    pub listener: Arc<dyn CaptureListener>,
}

/// One clipboard history rooted at a data directory.
pub struct Clipshelf {
    data_dir: PathBuf,
    settings: RwLock<Settings>,
    store: Arc<ContentStore>,
    history: Arc<HistoryRepository>,
    monitor: Arc<ClipboardMonitor>,
    paster: Arc<Paster>,
}

impl Clipshelf {
    /// Open (or create) the history under `data_dir`. The monitor is built
    /// but not started; call [`start`](Self::start).
    pub fn open(data_dir: impl Into<PathBuf>, platform: Platform) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).map_err(|source| Error::DataDir {
            path: data_dir.clone(),
            source,
        })?;

        let store = Arc::new(
            ContentStore::open(data_dir.join(IMAGES_DIR), None).map_err(HistoryError::from)?,
        );
        let history = Arc::new(HistoryRepository::open(
            &data_dir,
            store.clone(),
            config::DEFAULT_HISTORY_LIMIT,
        )?);

        let settings = history.load_settings();
        store.set_size_limit(settings.size_limit());
        history.set_retention_limit(settings.history_limit());

        let monitor = Arc::new(ClipboardMonitor::new(
            platform.pasteboard.clone(),
            platform.frontmost,
            history.clone(),
            store.clone(),
            platform.listener,
            &settings,
        ));
        let paster = Arc::new(Paster::new(
            platform.pasteboard,
            monitor.clone(),
            platform.injector,
            settings.paste_suppression(),
        ));

        info!(
            "Opened history at {} ({} items)",
            data_dir.display(),
            history.count().unwrap_or(0)
        );

        Ok(Self {
            data_dir,
            settings: RwLock::new(settings),
            store,
            history,
            monitor,
            paster,
        })
    }

    /// Open under `$CLIPSHELF_DATA_DIR`, or the platform data directory.
    pub fn open_default(platform: Platform) -> Result<Self> {
        let data_dir = config::default_data_dir().ok_or(Error::NoDataDir)?;
        Self::open(data_dir, platform)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn history(&self) -> &Arc<HistoryRepository> {
        &self.history
    }

    pub fn store(&self) -> &Arc<ContentStore> {
        &self.store
    }

    pub fn monitor(&self) -> &Arc<ClipboardMonitor> {
        &self.monitor
    }

    pub fn paster(&self) -> &Arc<Paster> {
        &self.paster
    }

    /// Start monitoring, unless the user switched it off.
    pub fn start(&self) {
        if self.settings().monitoring_enabled {
            self.monitor.start();
        } else {
            info!("Monitoring disabled in settings, not starting");
        }
    }

    pub fn stop(&self) {
        self.monitor.stop();
    }

    /// Persist `settings` and push them into the live components.
    pub fn apply_settings(&self, settings: Settings) -> Result<()> {
        self.history.save_settings(&settings)?;

        self.store.set_size_limit(settings.size_limit());
        self.history.set_retention_limit(settings.history_limit());
        let evicted = self.history.trim(settings.history_limit())?;
        if evicted > 0 {
            info!("Retention limit lowered, evicted {} items", evicted);
        }
        self.monitor.apply_settings(&settings);
        self.paster.set_suppression(settings.paste_suppression());

        if settings.monitoring_enabled {
            self.monitor.start();
        } else {
            self.monitor.stop();
        }

        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = settings;
        Ok(())
    }

    /// Paste the item with `id`. `None` when no such item exists.
    pub fn paste(&self, id: &str) -> Result<Option<PasteOutcome>> {
        let Some(item) = self.history.get(id)? else {
            warn!("Paste requested for unknown item {}", id);
            return Ok(None);
        };
        Ok(Some(self.paster.paste(&item)))
    }

    /// Delete image files no history row points at.
    pub fn purge_orphans(&self) -> Result<usize> {
        let referenced = self.history.referenced_image_paths()?;
        let purged = self
            .store
            .purge_orphans(&referenced)
            .map_err(HistoryError::from)?;
        Ok(purged)
    }
}

impl Drop for Clipshelf {
    fn drop(&mut self) {
        self.monitor.stop();
    }
}
