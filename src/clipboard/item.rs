use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::format::ImageFormat;
use super::hash::hash_text;
use super::pasteboard::SourceApp;

/// Characters kept in notification previews.
pub const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Text,
    Image,
}

impl ItemKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ItemKind::Text => "text",
            ItemKind::Image => "image",
        }
    }
}

/// Stored image blob backing an image item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ItemContent {
    Text(String),
    Image(ImageRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClipboardItem {
    pub id: String,
    pub content: ItemContent,
    pub content_hash: String,
    pub source_app: Option<SourceApp>,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub is_pinned: bool,
    pub pinned_at: Option<i64>,
}

impl ClipboardItem {
    pub fn text(content: String, source_app: Option<SourceApp>) -> Self {
        let content_hash = hash_text(&content);
        Self::new(ItemContent::Text(content), content_hash, source_app)
    }

    /// `content_hash` must be the digest of the blob's bytes.
    pub fn image(image: ImageRef, content_hash: String, source_app: Option<SourceApp>) -> Self {
        Self::new(ItemContent::Image(image), content_hash, source_app)
    }

    fn new(content: ItemContent, content_hash: String, source_app: Option<SourceApp>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            content_hash,
            source_app,
            created_at: Utc::now().timestamp_millis(),
            is_pinned: false,
            pinned_at: None,
        }
    }

    pub fn with_created_at(mut self, created_at: i64) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn pinned_at(mut self, pinned_at: i64) -> Self {
        self.is_pinned = true;
        self.pinned_at = Some(pinned_at);
        self
    }

    pub fn kind(&self) -> ItemKind {
        match self.content {
            ItemContent::Text(_) => ItemKind::Text,
            ItemContent::Image(_) => ItemKind::Image,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            ItemContent::Text(text) => Some(text),
            ItemContent::Image(_) => None,
        }
    }

    pub fn image_ref(&self) -> Option<&ImageRef> {
        match &self.content {
            ItemContent::Image(image) => Some(image),
            ItemContent::Text(_) => None,
        }
    }

    pub fn image_format(&self) -> Option<ImageFormat> {
        self.image_ref().map(|image| image.format)
    }

    /// Original bytes of an image item, if the blob is still on disk.
    pub fn read_image_bytes(&self) -> Option<Vec<u8>> {
        self.image_ref().and_then(|image| std::fs::read(&image.path).ok())
    }

    pub fn display_text(&self) -> String {
        match &self.content {
            ItemContent::Text(text) => text.clone(),
            ItemContent::Image(image) => {
                format!("[{} × {} {}]", image.width, image.height, image.format)
            }
        }
    }

    pub fn preview(&self, max_chars: usize) -> String {
        truncate(&self.display_text(), max_chars)
    }

    /// Case-insensitive search. Image bytes are not searchable: images match
    /// on their source app name or the keyword "image".
    pub fn matches_search(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        if query.is_empty() {
            return true;
        }
        match &self.content {
            ItemContent::Text(text) => text.to_lowercase().contains(&query),
            ItemContent::Image(_) => {
                let app_match = self
                    .source_app
                    .as_ref()
                    .and_then(|app| app.display_name.as_deref())
                    .is_some_and(|name| name.to_lowercase().contains(&query));
                app_match || "image".contains(&query)
            }
        }
    }
}

pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}
