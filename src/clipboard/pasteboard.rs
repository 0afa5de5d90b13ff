//! Collaborator seams for the system clipboard and the frontmost application.
//!
//! The platform has no change notifications, so everything here is polled.
//! `MemoryPasteboard` is a complete in-process implementation used by tests
//! and by hosts that bridge a native pasteboard into it.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, RwLock};

use serde::{Deserialize, Serialize};

use super::format::{FILE_URL_TYPE, TEXT_TYPE};

/// Application that owned the focus when something was copied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceApp {
    pub display_name: Option<String>,
    pub bundle_id: Option<String>,
}

impl SourceApp {
    pub fn new(display_name: impl Into<String>, bundle_id: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            bundle_id: Some(bundle_id.into()),
        }
    }
}

/// One representation written to the pasteboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteboardEntry {
    Text(String),
    Data { type_id: String, bytes: Vec<u8> },
    FileUrl(PathBuf),
}

pub trait Pasteboard: Send + Sync {
    /// Bumped by the OS on every write.
    fn change_count(&self) -> i64;

    /// Type identifiers currently declared, in the order the writer declared them.
    fn types(&self) -> Vec<String>;

    fn data(&self, type_id: &str) -> Option<Vec<u8>>;

    fn file_urls(&self) -> Vec<PathBuf>;

    /// Clear the pasteboard and write `entries` as one change.
    fn write(&self, entries: Vec<PasteboardEntry>);

    fn string(&self) -> Option<String> {
        self.data(TEXT_TYPE)
            .and_then(|bytes| String::from_utf8(bytes).ok())
    }

    fn has_type(&self, type_id: &str) -> bool {
        self.types().iter().any(|t| t == type_id)
    }
}

pub trait FrontmostApp: Send + Sync {
    fn frontmost_app(&self) -> Option<SourceApp>;
}

#[derive(Debug, Default)]
struct MemoryState {
    change_count: i64,
    entries: Vec<(String, Vec<u8>)>,
    files: Vec<PathBuf>,
}

#[derive(Debug, Default)]
pub struct MemoryPasteboard {
    state: Mutex<MemoryState>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_text(&self, text: &str) {
        self.write(vec![PasteboardEntry::Text(text.to_string())]);
    }

    pub fn set_data(&self, type_id: &str, bytes: &[u8]) {
        self.write(vec![PasteboardEntry::Data {
            type_id: type_id.to_string(),
            bytes: bytes.to_vec(),
        }]);
    }

    pub fn clear(&self) {
        self.write(Vec::new());
    }

    /// Bump the change counter without touching the contents, like an app
    /// re-writing identical data.
    pub fn touch(&self) {
        self.lock().change_count += 1;
    }
}

impl Pasteboard for MemoryPasteboard {
    fn change_count(&self) -> i64 {
        self.lock().change_count
    }

    fn types(&self) -> Vec<String> {
        let state = self.lock();
        let mut types: Vec<String> = state.entries.iter().map(|(t, _)| t.clone()).collect();
        if !state.files.is_empty() {
            types.push(FILE_URL_TYPE.to_string());
        }
        types
    }

    fn data(&self, type_id: &str) -> Option<Vec<u8>> {
        self.lock()
            .entries
            .iter()
            .find(|(t, _)| t == type_id)
            .map(|(_, bytes)| bytes.clone())
    }

    fn file_urls(&self) -> Vec<PathBuf> {
        self.lock().files.clone()
    }

    fn write(&self, entries: Vec<PasteboardEntry>) {
        let mut state = self.lock();
        state.entries.clear();
        state.files.clear();
        for entry in entries {
            match entry {
                PasteboardEntry::Text(text) => {
                    state.entries.push((TEXT_TYPE.to_string(), text.into_bytes()))
                }
                PasteboardEntry::Data { type_id, bytes } => state.entries.push((type_id, bytes)),
                PasteboardEntry::FileUrl(path) => state.files.push(path),
            }
        }
        state.change_count += 1;
    }
}

/// Frontmost-application source the host updates on activation changes.
#[derive(Debug, Default)]
pub struct MemoryFrontmost {
    app: RwLock<Option<SourceApp>>,
}

impl MemoryFrontmost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, app: Option<SourceApp>) {
        *self.app.write().unwrap_or_else(|e| e.into_inner()) = app;
    }
}

impl FrontmostApp for MemoryFrontmost {
    fn frontmost_app(&self) -> Option<SourceApp> {
        self.app.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}
