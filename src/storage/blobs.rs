//! Content-addressed image storage.
//!
//! One file per distinct payload, named `<sha256-hex>.<ext>`, holding exactly
//! the bytes the clipboard provided. No transcoding.

use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, info, warn};

use crate::clipboard::format::ImageFormat;
use crate::clipboard::hash::hash_bytes;
use crate::error::StoreError;

const PARTIAL_EXT: &str = "partial";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub path: PathBuf,
    pub hash: String,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub size: u64,
}

pub struct ContentStore {
    dir: PathBuf,
    size_limit: RwLock<Option<u64>>,
}

impl ContentStore {
    pub fn open(dir: impl Into<PathBuf>, size_limit: Option<u64>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        info!("Image store: {}", dir.display());
        Ok(Self {
            dir,
            size_limit: RwLock::new(size_limit),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn size_limit(&self) -> Option<u64> {
        *self.size_limit.read().unwrap_or_else(|e| e.into_inner())
    }

    /// `None` disables the large-image guard.
    pub fn set_size_limit(&self, limit: Option<u64>) {
        *self.size_limit.write().unwrap_or_else(|e| e.into_inner()) = limit;
    }

    pub fn path_for(&self, hash: &str, format: ImageFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", hash, format.extension()))
    }

    /// Store `bytes` under their digest. Writing the same payload twice
    /// returns the existing file untouched.
    pub fn put(&self, bytes: &[u8], format: ImageFormat) -> Result<StoredBlob, StoreError> {
        let size = bytes.len() as u64;
        if let Some(limit) = self.size_limit() {
            if size > limit {
                return Err(StoreError::PayloadTooLarge { size, limit });
            }
        }

        let hash = hash_bytes(bytes);
        let (path, format) = match self.existing(&hash) {
            Some(found) => {
                debug!("Blob {} already stored, skipping write", &hash[..12]);
                found
            }
            None => {
                let path = self.path_for(&hash, format);
                write_atomically(&path, bytes)?;
                debug!("Stored blob {} ({} bytes, {})", &hash[..12], size, format);
                (path, format)
            }
        };

        let (width, height) = image_dimensions(bytes);
        Ok(StoredBlob {
            path,
            hash,
            width,
            height,
            format,
            size,
        })
    }

    /// The file already holding `hash`, whatever extension it was stored under.
    fn existing(&self, hash: &str) -> Option<(PathBuf, ImageFormat)> {
        ImageFormat::ALL
            .iter()
            .map(|&format| (self.path_for(hash, format), format))
            .find(|(path, _)| path.is_file())
    }

    /// Best effort; a missing file is fine.
    pub fn delete(&self, path: &Path) {
        match fs::remove_file(path) {
            Ok(()) => debug!("Deleted blob {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to delete blob {}: {}", path.display(), e),
        }
    }

    /// Remove every file in the store that is not in `referenced`.
    pub fn purge_orphans(&self, referenced: &HashSet<PathBuf>) -> Result<usize, StoreError> {
        let keep: HashSet<OsString> = referenced
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_os_string()))
            .collect();

        let mut deleted = 0;
        for path in self.files()? {
            let orphan = path.file_name().is_some_and(|name| !keep.contains(name));
            if orphan && fs::remove_file(&path).is_ok() {
                debug!("Purged orphan blob {}", path.display());
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!("Purged {} orphaned image files", deleted);
        }
        Ok(deleted)
    }

    /// Total bytes on disk.
    pub fn total_size(&self) -> u64 {
        self.files()
            .unwrap_or_default()
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum()
    }

    /// Remove every blob. Returns how many files went away.
    pub fn clear(&self) -> usize {
        let removed = self
            .files()
            .unwrap_or_default()
            .into_iter()
            .filter(|p| fs::remove_file(p).is_ok())
            .count();
        info!("Cleared {} image files", removed);
        removed
    }

    fn files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            // In-flight writes belong to a concurrent `put`.
            .filter(|path| path.extension() != Some(OsStr::new(PARTIAL_EXT)))
            .collect())
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension(PARTIAL_EXT);
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    fs::write(&tmp, bytes).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        io_err(source)
    })
}

/// Pixel size of an encoded image, `(0, 0)` when it cannot be decoded.
pub fn image_dimensions(bytes: &[u8]) -> (u32, u32) {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .unwrap_or((0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn store(limit: Option<u64>) -> (tempfile::TempDir, ContentStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path().join("images"), limit).unwrap();
        (dir, store)
    }

    #[test]
    fn test_put_writes_verbatim_and_decodes_dimensions() {
        let (_dir, store) = store(None);
        let bytes = png_bytes(3, 2);

        let blob = store.put(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(blob.hash, hash_bytes(&bytes));
        assert_eq!(blob.path, store.dir().join(format!("{}.png", blob.hash)));
        assert_eq!((blob.width, blob.height), (3, 2));
        assert_eq!(fs::read(&blob.path).unwrap(), bytes);
    }

    #[test]
    fn test_put_is_idempotent() {
        let (_dir, store) = store(None);
        let bytes = png_bytes(1, 1);

        let first = store.put(&bytes, ImageFormat::Png).unwrap();
        let second = store.put(&bytes, ImageFormat::Png).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.files().unwrap().len(), 1);
    }

    #[test]
    fn test_same_bytes_under_another_format_reuse_the_file() {
        let (_dir, store) = store(None);
        let first = store.put(b"same payload", ImageFormat::Png).unwrap();
        let second = store.put(b"same payload", ImageFormat::Tiff).unwrap();

        assert_eq!(first.hash, second.hash);
        assert_eq!(second.path, first.path);
        assert_eq!(second.format, ImageFormat::Png);
        assert_eq!(store.files().unwrap().len(), 1);
    }

    #[test]
    fn test_partial_files_are_left_alone() {
        let (_dir, store) = store(None);
        let kept = store.put(b"kept", ImageFormat::Png).unwrap();
        let partial = store.dir().join(format!("{}.{}", hash_bytes(b"busy"), PARTIAL_EXT));
        fs::write(&partial, b"busy").unwrap();

        assert_eq!(store.files().unwrap(), vec![kept.path.clone()]);
        assert_eq!(store.purge_orphans(&HashSet::new()).unwrap(), 1);
        assert_eq!(store.clear(), 0);
        assert!(partial.exists());
        assert_eq!(store.total_size(), 0);
    }

    #[test]
    fn test_undecodable_bytes_store_with_zero_size() {
        let (_dir, store) = store(None);
        let blob = store.put(b"%PDF-1.7 not an image", ImageFormat::Pdf).unwrap();
        assert_eq!((blob.width, blob.height), (0, 0));
        assert!(blob.path.to_string_lossy().ends_with(".pdf"));
        assert!(blob.path.exists());
    }

    #[test]
    fn test_size_guard_rejects_before_writing() {
        let limit = 20 * 1024 * 1024;
        let payload = vec![7u8; 21 * 1024 * 1024];

        let (_dir, guarded) = store(Some(limit));
        let err = guarded.put(&payload, ImageFormat::Tiff).unwrap_err();
        assert!(err.is_too_large());
        assert!(guarded.files().unwrap().is_empty());

        guarded.set_size_limit(None);
        let blob = guarded.put(&payload, ImageFormat::Tiff).unwrap();
        assert_eq!(blob.size, payload.len() as u64);
        assert_eq!(guarded.total_size(), payload.len() as u64);
    }

    #[test]
    fn test_delete_missing_file_is_silent() {
        let (_dir, store) = store(None);
        let blob = store.put(b"gif-ish", ImageFormat::Gif).unwrap();
        store.delete(&blob.path);
        assert!(!blob.path.exists());
        store.delete(&blob.path);
    }

    #[test]
    fn test_purge_orphans_keeps_referenced() {
        let (_dir, store) = store(None);
        let keep = store.put(b"keep", ImageFormat::Png).unwrap();
        let drop = store.put(b"drop", ImageFormat::Jpeg).unwrap();

        let referenced: HashSet<PathBuf> = [keep.path.clone()].into_iter().collect();
        assert_eq!(store.purge_orphans(&referenced).unwrap(), 1);
        assert!(keep.path.exists());
        assert!(!drop.path.exists());
    }

    #[test]
    fn test_clear_removes_everything() {
        let (_dir, store) = store(None);
        store.put(b"one", ImageFormat::Png).unwrap();
        store.put(b"two", ImageFormat::Bmp).unwrap();
        assert_eq!(store.clear(), 2);
        assert_eq!(store.total_size(), 0);
    }
}
