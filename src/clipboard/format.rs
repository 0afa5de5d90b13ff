//! Image formats the history understands, and the one table that maps
//! platform type identifiers and file extensions onto them.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Plain text flavour on the pasteboard.
pub const TEXT_TYPE: &str = "public.utf8-plain-text";
/// File reference flavour on the pasteboard.
pub const FILE_URL_TYPE: &str = "public.file-url";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Tiff,
    Pdf,
    Jpeg,
    Heic,
    Heif,
    Gif,
    Webp,
    Bmp,
}

/// Platform type identifier -> format. The first identifier listed for a
/// format is the one written back when pasting.
const TYPE_TABLE: &[(&str, ImageFormat)] = &[
    ("public.png", ImageFormat::Png),
    ("public.tiff", ImageFormat::Tiff),
    ("NeXT TIFF v4.0 pasteboard type", ImageFormat::Tiff),
    ("com.adobe.pdf", ImageFormat::Pdf),
    ("Apple PDF pasteboard type", ImageFormat::Pdf),
    ("public.jpeg", ImageFormat::Jpeg),
    ("public.heic", ImageFormat::Heic),
    ("public.heif", ImageFormat::Heif),
    ("com.compuserve.gif", ImageFormat::Gif),
    ("org.webmproject.webp", ImageFormat::Webp),
    ("public.webp", ImageFormat::Webp),
    ("com.microsoft.bmp", ImageFormat::Bmp),
];

/// File extension (lowercase) -> format.
const EXTENSION_TABLE: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("tiff", ImageFormat::Tiff),
    ("tif", ImageFormat::Tiff),
    ("pdf", ImageFormat::Pdf),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("jpe", ImageFormat::Jpeg),
    ("heic", ImageFormat::Heic),
    ("heif", ImageFormat::Heif),
    ("gif", ImageFormat::Gif),
    ("webp", ImageFormat::Webp),
    ("bmp", ImageFormat::Bmp),
];

/// Order in which raster flavours are taken off the pasteboard.
pub const RASTER_PRIORITY: [ImageFormat; 8] = [
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::Jpeg,
    ImageFormat::Heic,
    ImageFormat::Heif,
    ImageFormat::Gif,
    ImageFormat::Webp,
    ImageFormat::Bmp,
];

impl ImageFormat {
    pub const ALL: [ImageFormat; 9] = [
        ImageFormat::Png,
        ImageFormat::Tiff,
        ImageFormat::Pdf,
        ImageFormat::Jpeg,
        ImageFormat::Heic,
        ImageFormat::Heif,
        ImageFormat::Gif,
        ImageFormat::Webp,
        ImageFormat::Bmp,
    ];

    pub fn from_type_identifier(type_id: &str) -> Option<Self> {
        TYPE_TABLE
            .iter()
            .find(|(id, _)| *id == type_id)
            .map(|(_, format)| *format)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        EXTENSION_TABLE
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, format)| *format)
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// Parse the stored tag produced by [`ImageFormat::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| format.tag() == tag)
    }

    /// All type identifiers that carry this format, preferred first.
    pub fn type_identifiers(self) -> impl Iterator<Item = &'static str> {
        TYPE_TABLE
            .iter()
            .filter(move |(_, format)| *format == self)
            .map(|(id, _)| *id)
    }

    pub fn type_identifier(self) -> &'static str {
        // Every variant has at least one row in TYPE_TABLE.
        self.type_identifiers().next().unwrap_or("public.png")
    }

    pub fn tag(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Pdf => "pdf",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Heic => "heic",
            ImageFormat::Heif => "heif",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
            ImageFormat::Bmp => "bmp",
        }
    }

    /// Extension used for blob file names.
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            other => other.tag(),
        }
    }

    pub fn is_raster(self) -> bool {
        self != ImageFormat::Pdf
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag().to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_type_identifier_maps() {
        let expected = [
            ("public.png", ImageFormat::Png),
            ("public.tiff", ImageFormat::Tiff),
            ("NeXT TIFF v4.0 pasteboard type", ImageFormat::Tiff),
            ("com.adobe.pdf", ImageFormat::Pdf),
            ("Apple PDF pasteboard type", ImageFormat::Pdf),
            ("public.jpeg", ImageFormat::Jpeg),
            ("public.heic", ImageFormat::Heic),
            ("public.heif", ImageFormat::Heif),
            ("com.compuserve.gif", ImageFormat::Gif),
            ("org.webmproject.webp", ImageFormat::Webp),
            ("public.webp", ImageFormat::Webp),
            ("com.microsoft.bmp", ImageFormat::Bmp),
        ];
        for (id, format) in expected {
            assert_eq!(ImageFormat::from_type_identifier(id), Some(format), "{id}");
        }
        assert_eq!(ImageFormat::from_type_identifier(TEXT_TYPE), None);
        assert_eq!(ImageFormat::from_type_identifier("public.svg-image"), None);
    }

    #[test]
    fn test_every_format_has_identifier_and_roundtrips_tag() {
        for format in ImageFormat::ALL {
            let id = format.type_identifier();
            assert_eq!(ImageFormat::from_type_identifier(id), Some(format));
            assert_eq!(ImageFormat::from_tag(format.tag()), Some(format));
            assert_eq!(ImageFormat::from_extension(format.extension()), Some(format));
        }
    }

    #[test]
    fn test_extensions_are_case_insensitive() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("Tif"), Some(ImageFormat::Tiff));
        assert_eq!(
            ImageFormat::from_path(Path::new("/tmp/shot.HEIC")),
            Some(ImageFormat::Heic)
        );
        assert_eq!(ImageFormat::from_path(Path::new("/tmp/notes.txt")), None);
        assert_eq!(ImageFormat::from_path(Path::new("/tmp/noext")), None);
    }

    #[test]
    fn test_raster_priority_starts_with_png_then_tiff() {
        assert_eq!(RASTER_PRIORITY[0], ImageFormat::Png);
        assert_eq!(RASTER_PRIORITY[1], ImageFormat::Tiff);
        assert!(RASTER_PRIORITY.iter().all(|f| f.is_raster()));
        assert!(!ImageFormat::Pdf.is_raster());
    }

    #[test]
    fn test_display_is_uppercase_tag() {
        assert_eq!(ImageFormat::Jpeg.to_string(), "JPEG");
        assert_eq!(ImageFormat::Jpeg.extension(), "jpg");
    }
}
