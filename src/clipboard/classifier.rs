use std::fs;

use log::{debug, warn};

use super::format::{ImageFormat, RASTER_PRIORITY};
use super::hash::{hash_bytes, hash_text};
use super::pasteboard::Pasteboard;

/// What the pasteboard currently holds, reduced to the one representation the
/// history keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Text(String),
    Image { bytes: Vec<u8>, format: ImageFormat },
}

impl ClipboardContent {
    /// Digest of the canonical payload, shared with the stored item's hash.
    pub fn fingerprint(&self) -> String {
        match self {
            ClipboardContent::Text(text) => hash_text(text),
            ClipboardContent::Image { bytes, .. } => hash_bytes(bytes),
        }
    }
}

/// Decide what the pasteboard holds. Priority:
///
/// 1. a file reference to an existing raster image file (bytes read from disk),
/// 2. a raster representation, PNG then TIFF then the rest,
/// 3. a PDF representation, unless non-empty plain text is also present,
/// 4. non-empty plain text.
///
/// Anything else is unsupported and yields `None`.
pub fn classify(pasteboard: &dyn Pasteboard) -> Option<ClipboardContent> {
    if let Some(content) = image_from_file_urls(pasteboard) {
        return Some(content);
    }

    for format in RASTER_PRIORITY {
        if let Some(bytes) = first_representation(pasteboard, format) {
            return Some(ClipboardContent::Image { bytes, format });
        }
    }

    let text = pasteboard.string().filter(|t| !t.is_empty());

    // Apps that dual-write text and PDF mean the text.
    if text.is_none() {
        if let Some(bytes) = first_representation(pasteboard, ImageFormat::Pdf) {
            return Some(ClipboardContent::Image {
                bytes,
                format: ImageFormat::Pdf,
            });
        }
    }

    if let Some(text) = text {
        return Some(ClipboardContent::Text(text));
    }

    debug!("Clipboard content unsupported (types: {:?})", pasteboard.types());
    None
}

fn first_representation(pasteboard: &dyn Pasteboard, format: ImageFormat) -> Option<Vec<u8>> {
    format
        .type_identifiers()
        .filter_map(|type_id| pasteboard.data(type_id))
        .find(|bytes| !bytes.is_empty())
}

fn image_from_file_urls(pasteboard: &dyn Pasteboard) -> Option<ClipboardContent> {
    for path in pasteboard.file_urls() {
        let Some(format) = ImageFormat::from_path(&path).filter(|f| f.is_raster()) else {
            continue;
        };
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => continue,
        }
        match fs::read(&path) {
            Ok(bytes) => {
                debug!(
                    "Using file-backed image {} ({} bytes)",
                    path.display(),
                    bytes.len()
                );
                return Some(ClipboardContent::Image { bytes, format });
            }
            Err(e) => {
                warn!("Failed to read copied image file {}: {}", path.display(), e);
            }
        }
    }
    None
}
