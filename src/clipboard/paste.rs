use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use super::item::{ClipboardItem, ItemContent};
use super::monitor::ClipboardMonitor;
use super::pasteboard::{Pasteboard, PasteboardEntry};

/// Synthesises the paste shortcut in the frontmost application.
pub trait KeystrokeInjector: Send + Sync {
    /// Returns `false` when the OS refuses (no accessibility permission).
    fn send_paste(&self) -> bool;
}

/// Injector for hosts without keystroke synthesis; every paste is copy-only.
pub struct CopyOnly;

impl KeystrokeInjector for CopyOnly {
    fn send_paste(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasteOutcome {
    Pasted,
    /// Written to the pasteboard, but the keystroke could not be sent.
    CopiedOnly,
    /// Image blob no longer on disk; pasteboard left untouched.
    Unavailable,
}

/// Puts a history item back on the pasteboard and pastes it, without the
/// monitor recording the write as a fresh copy.
pub struct Paster {
    pasteboard: Arc<dyn Pasteboard>,
    monitor: Arc<ClipboardMonitor>,
    injector: Arc<dyn KeystrokeInjector>,
    suppression_ms: AtomicU64,
}

impl Paster {
    pub fn new(
        pasteboard: Arc<dyn Pasteboard>,
        monitor: Arc<ClipboardMonitor>,
        injector: Arc<dyn KeystrokeInjector>,
        suppression: Duration,
    ) -> Self {
        Self {
            pasteboard,
            monitor,
            injector,
            suppression_ms: AtomicU64::new(suppression.as_millis() as u64),
        }
    }

    pub fn suppression(&self) -> Duration {
        Duration::from_millis(self.suppression_ms.load(Ordering::Relaxed))
    }

    pub fn set_suppression(&self, window: Duration) {
        self.suppression_ms
            .store(window.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn paste(&self, item: &ClipboardItem) -> PasteOutcome {
        let Some(entries) = entries_for(item) else {
            warn!("Cannot paste {}: image file is missing", item.id);
            return PasteOutcome::Unavailable;
        };

        let window = self.suppression();
        self.monitor.suspend_capture(window);
        self.pasteboard.write(entries);

        if !self.injector.send_paste() {
            warn!("Paste keystroke refused (accessibility permission?); item copied only");
            return PasteOutcome::CopiedOnly;
        }

        // The target app may touch the pasteboard while handling the keystroke.
        self.monitor.suspend_capture(window);
        info!("Pasted {} item {}", item.kind().as_str(), item.id);
        PasteOutcome::Pasted
    }
}

fn entries_for(item: &ClipboardItem) -> Option<Vec<PasteboardEntry>> {
    match &item.content {
        ItemContent::Text(text) => Some(vec![PasteboardEntry::Text(text.clone())]),
        ItemContent::Image(image) => {
            let bytes = item.read_image_bytes()?;
            Some(vec![
                PasteboardEntry::Data {
                    type_id: image.format.type_identifier().to_string(),
                    bytes,
                },
                PasteboardEntry::FileUrl(image.path.clone()),
            ])
        }
    }
}
