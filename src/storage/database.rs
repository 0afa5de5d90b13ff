use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use log::{debug, info, warn};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::blobs::ContentStore;
use crate::clipboard::format::ImageFormat;
use crate::clipboard::item::{ClipboardItem, ImageRef, ItemContent, ItemKind};
use crate::clipboard::pasteboard::SourceApp;
use crate::config::Settings;
use crate::error::HistoryError;

pub type Result<T> = std::result::Result<T, HistoryError>;

const DB_FILE: &str = "clipshelf.db";
const SETTINGS_KEY: &str = "settings";

const ITEM_COLUMNS: &str = "id, kind, text_content, content_hash, image_path, image_width,
     image_height, image_format, source_app, source_bundle_id, created_at, is_pinned, pinned_at";

/// Pinned first (most recently pinned on top), then newest first.
const DISPLAY_ORDER: &str = "ORDER BY is_pinned DESC,
     CASE WHEN is_pinned = 1 THEN pinned_at END DESC,
     created_at DESC, rowid DESC";

/// Restrict history to one source application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
    pub display_name: String,
    pub bundle_id: Option<String>,
}

impl SourceFilter {
    /// Bundle id wins when the filter has one; rows captured without a bundle
    /// id are matched by display name.
    pub fn matches(&self, item: &ClipboardItem) -> bool {
        let app = item.source_app.as_ref();
        match self.bundle_id.as_deref().filter(|b| !b.is_empty()) {
            Some(bundle_id) => app.and_then(|a| a.bundle_id.as_deref()) == Some(bundle_id),
            None => app.and_then(|a| a.display_name.as_deref()) == Some(self.display_name.as_str()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub source: Option<SourceFilter>,
    pub search: Option<String>,
}

impl HistoryQuery {
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn source(filter: SourceFilter) -> Self {
        Self {
            source: Some(filter),
            ..Self::default()
        }
    }

    fn matches(&self, item: &ClipboardItem) -> bool {
        let source_ok = match &self.source {
            Some(filter) if !filter.display_name.is_empty() => filter.matches(item),
            _ => true,
        };
        let search_ok = match self.search.as_deref() {
            Some(text) => item.matches_search(text),
            None => true,
        };
        source_ok && search_ok
    }
}

/// How often an application shows up as a capture source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppUsage {
    pub display_name: String,
    pub bundle_id: Option<String>,
    pub count: usize,
}

impl AppUsage {
    pub fn as_filter(&self) -> SourceFilter {
        SourceFilter {
            display_name: self.display_name.clone(),
            bundle_id: self.bundle_id.clone(),
        }
    }
}

/// Persisted clipboard history. Every structural change runs in one SQLite
/// transaction behind a single connection lock; image blobs are removed after
/// the transaction commits.
pub struct HistoryRepository {
    conn: Mutex<Connection>,
    store: Arc<ContentStore>,
    retention_limit: AtomicUsize,
}

impl HistoryRepository {
    pub fn open(data_dir: &Path, store: Arc<ContentStore>, retention_limit: usize) -> Result<Self> {
        let db_path = data_dir.join(DB_FILE);
        info!("Database: {}", db_path.display());
        let conn = Connection::open(&db_path)?;
        Self::from_connection(conn, store, retention_limit)
    }

    pub fn open_in_memory(store: Arc<ContentStore>, retention_limit: usize) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, store, retention_limit)
    }

    fn from_connection(
        conn: Connection,
        store: Arc<ContentStore>,
        retention_limit: usize,
    ) -> Result<Self> {
        let repo = Self {
            conn: Mutex::new(conn),
            store,
            retention_limit: AtomicUsize::new(retention_limit),
        };
        repo.run_migrations()?;
        Ok(repo)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA busy_timeout = 5000;

            CREATE TABLE IF NOT EXISTS clipboard_items (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                text_content TEXT,
                content_hash TEXT NOT NULL UNIQUE,
                image_path TEXT,
                image_width INTEGER NOT NULL DEFAULT 0,
                image_height INTEGER NOT NULL DEFAULT 0,
                image_format TEXT,
                source_app TEXT,
                source_bundle_id TEXT,
                created_at INTEGER NOT NULL,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                pinned_at INTEGER
            );

            CREATE INDEX IF NOT EXISTS idx_created_at ON clipboard_items(created_at DESC);
            CREATE INDEX IF NOT EXISTS idx_pinned ON clipboard_items(is_pinned, pinned_at DESC);

            CREATE TABLE IF NOT EXISTS app_config (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        debug!("Database migrations complete");
        Ok(())
    }

    pub fn retention_limit(&self) -> usize {
        self.retention_limit.load(Ordering::Relaxed)
    }

    pub fn set_retention_limit(&self, limit: usize) {
        self.retention_limit.store(limit, Ordering::Relaxed);
    }

    /// Persist `item` unless an item with the same content hash is live.
    /// Returns true if inserted. A successful insert trims history to the
    /// retention limit in the same transaction.
    pub fn insert_if_new(&self, item: &ClipboardItem) -> Result<bool> {
        let limit = self.retention_limit();
        let evicted = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;

            let inserted = insert_row(&tx, item)?;
            if !inserted {
                debug!("Duplicate content {}.., skipped", short(&item.content_hash));
                return Ok(false);
            }

            let evicted = trim_rows(&tx, limit)?;
            tx.commit()?;
            evicted
        };

        self.remove_blobs(&evicted);
        if !evicted.is_empty() {
            info!("Expired {} old items (limit: {})", evicted.len(), limit);
        }
        Ok(true)
    }

    /// Delete the oldest unpinned items until at most `limit` unpinned items
    /// remain. Pinned items are never trimmed.
    pub fn trim(&self, limit: usize) -> Result<usize> {
        let evicted = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let evicted = trim_rows(&tx, limit)?;
            tx.commit()?;
            evicted
        };
        self.remove_blobs(&evicted);
        Ok(evicted.len())
    }

    pub fn delete(&self, id: &str) -> Result<bool> {
        let removed = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let image_path: Option<Option<String>> = tx
                .query_row(
                    "SELECT image_path FROM clipboard_items WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(image_path) = image_path else {
                return Ok(false);
            };
            tx.execute("DELETE FROM clipboard_items WHERE id = ?1", params![id])?;
            tx.commit()?;
            vec![image_path.map(PathBuf::from)]
        };
        self.remove_blobs(&removed);
        info!("Deleted item {}", id);
        Ok(true)
    }

    /// Remove every item and every blob they reference.
    pub fn clear_all(&self) -> Result<usize> {
        let removed = {
            let mut conn = self.lock();
            let tx = conn.transaction()?;
            let paths = {
                let mut stmt = tx.prepare("SELECT image_path FROM clipboard_items")?;
                let paths = stmt
                    .query_map([], |row| row.get::<_, Option<String>>(0))?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                paths
            };
            tx.execute("DELETE FROM clipboard_items", [])?;
            tx.commit()?;
            paths
                .into_iter()
                .map(|p| p.map(PathBuf::from))
                .collect::<Vec<_>>()
        };
        self.remove_blobs(&removed);
        info!("Cleared history ({} items)", removed.len());
        Ok(removed.len())
    }

    /// [`clear_all`](Self::clear_all) on the blocking pool, for callers on a
    /// UI or async context.
    pub async fn clear_all_in_background(self: Arc<Self>) -> Result<usize> {
        let removed = tokio::task::spawn_blocking(move || self.clear_all()).await??;
        Ok(removed)
    }

    /// Flip the pin state. Returns the new state, or `None` for an unknown id.
    pub fn toggle_pin(&self, id: &str) -> Result<Option<bool>> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let pinned: Option<bool> = tx
            .query_row(
                "SELECT is_pinned FROM clipboard_items WHERE id = ?1",
                params![id],
                |row| row.get::<_, i32>(0).map(|v| v != 0),
            )
            .optional()?;
        let Some(pinned) = pinned else {
            return Ok(None);
        };

        let now_pinned = !pinned;
        let pinned_at = now_pinned.then(|| Utc::now().timestamp_millis());
        tx.execute(
            "UPDATE clipboard_items SET is_pinned = ?1, pinned_at = ?2 WHERE id = ?3",
            params![now_pinned as i32, pinned_at, id],
        )?;
        tx.commit()?;

        info!("{} item {}", if now_pinned { "Pinned" } else { "Unpinned" }, id);
        Ok(Some(now_pinned))
    }

    /// Items in display order, filtered by `query`.
    pub fn list(&self, query: &HistoryQuery) -> Result<Vec<ClipboardItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clipboard_items {}",
            ITEM_COLUMNS, DISPLAY_ORDER
        ))?;

        let items = stmt
            .query_map([], row_to_item)?
            .filter_map(|r| match r {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping unreadable history row: {}", e);
                    None
                }
            })
            .filter(|item| query.matches(item))
            .collect();

        Ok(items)
    }

    pub fn all(&self) -> Result<Vec<ClipboardItem>> {
        self.list(&HistoryQuery::default())
    }

    pub fn get(&self, id: &str) -> Result<Option<ClipboardItem>> {
        let conn = self.lock();
        let item = conn
            .query_row(
                &format!("SELECT {} FROM clipboard_items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    pub fn contains_hash(&self, hash: &str) -> Result<bool> {
        let conn = self.lock();
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM clipboard_items WHERE content_hash = ?1)",
            params![hash],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM clipboard_items", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn pinned_count(&self) -> Result<usize> {
        let conn = self.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM clipboard_items WHERE is_pinned = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Blob paths still referenced by live image items.
    pub fn referenced_image_paths(&self) -> Result<HashSet<PathBuf>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT image_path FROM clipboard_items WHERE image_path IS NOT NULL")?;
        let paths = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths.into_iter().map(PathBuf::from).collect())
    }

    /// Capture counts per source application, most frequent first.
    pub fn app_statistics(&self) -> Result<Vec<AppUsage>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT MAX(source_app), MAX(source_bundle_id), COUNT(*) AS n
             FROM clipboard_items
             WHERE source_app IS NOT NULL AND source_app != ''
             GROUP BY COALESCE(source_bundle_id, source_app)
             ORDER BY n DESC, MAX(source_app) ASC",
        )?;
        let stats = stmt
            .query_map([], |row| {
                Ok(AppUsage {
                    display_name: row.get(0)?,
                    bundle_id: row.get(1)?,
                    count: row.get::<_, i64>(2)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    pub fn top_apps(&self, n: usize) -> Result<Vec<AppUsage>> {
        let mut stats = self.app_statistics()?;
        stats.truncate(n);
        Ok(stats)
    }

    pub fn get_setting(&self, key: &str) -> Option<String> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM app_config WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .unwrap_or_else(|e| {
            warn!("Failed to read setting {}: {}", key, e);
            None
        })
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO app_config (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    /// Stored settings, or defaults when none are stored or they are unreadable.
    pub fn load_settings(&self) -> Settings {
        let Some(raw) = self.get_setting(SETTINGS_KEY) else {
            return Settings::default();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Stored settings are invalid, using defaults: {}", e);
            Settings::default()
        })
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let raw = serde_json::to_string(settings)?;
        self.set_setting(SETTINGS_KEY, &raw)
    }

    fn remove_blobs(&self, paths: &[Option<PathBuf>]) {
        for path in paths.iter().flatten() {
            self.store.delete(path);
        }
    }
}

fn short(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

fn insert_row(tx: &Transaction<'_>, item: &ClipboardItem) -> rusqlite::Result<bool> {
    let (text, image) = match &item.content {
        ItemContent::Text(text) => (Some(text.as_str()), None),
        ItemContent::Image(image) => (None, Some(image)),
    };
    let (display_name, bundle_id) = match &item.source_app {
        Some(app) => (app.display_name.as_deref(), app.bundle_id.as_deref()),
        None => (None, None),
    };

    let rows = tx.execute(
        "INSERT OR IGNORE INTO clipboard_items
         (id, kind, text_content, content_hash, image_path, image_width, image_height,
          image_format, source_app, source_bundle_id, created_at, is_pinned, pinned_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            item.id,
            item.kind().as_str(),
            text,
            item.content_hash,
            image.map(|i| i.path.to_string_lossy().into_owned()),
            image.map_or(0, |i| i.width),
            image.map_or(0, |i| i.height),
            image.map(|i| i.format.tag()),
            display_name,
            bundle_id,
            item.created_at,
            item.is_pinned as i32,
            item.pinned_at,
        ],
    )?;
    Ok(rows == 1)
}

/// Evict the oldest unpinned rows beyond `limit`; returns their blob paths.
fn trim_rows(tx: &Transaction<'_>, limit: usize) -> rusqlite::Result<Vec<Option<PathBuf>>> {
    let unpinned: i64 = tx.query_row(
        "SELECT COUNT(*) FROM clipboard_items WHERE is_pinned = 0",
        [],
        |row| row.get(0),
    )?;
    let excess = unpinned - limit as i64;
    if excess <= 0 {
        return Ok(Vec::new());
    }

    let victims = {
        let mut stmt = tx.prepare(
            "SELECT id, image_path FROM clipboard_items
             WHERE is_pinned = 0
             ORDER BY created_at ASC, rowid ASC
             LIMIT ?1",
        )?;
        let victims = stmt
            .query_map(params![excess], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        victims
    };

    for (id, _) in &victims {
        tx.execute("DELETE FROM clipboard_items WHERE id = ?1", params![id])?;
    }

    Ok(victims
        .into_iter()
        .map(|(_, path)| path.map(PathBuf::from))
        .collect())
}

fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ClipboardItem> {
    let kind: String = row.get(1)?;
    let content = if kind == ItemKind::Image.as_str() {
        let path: Option<String> = row.get(4)?;
        let path = path.map(PathBuf::from).ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(4, "image_path".to_string(), Type::Null)
        })?;
        let tag: Option<String> = row.get(7)?;
        let format = tag
            .as_deref()
            .and_then(ImageFormat::from_tag)
            .or_else(|| ImageFormat::from_path(&path))
            .unwrap_or(ImageFormat::Png);
        ItemContent::Image(ImageRef {
            path,
            width: row.get(5)?,
            height: row.get(6)?,
            format,
        })
    } else {
        ItemContent::Text(row.get::<_, Option<String>>(2)?.unwrap_or_default())
    };

    let display_name: Option<String> = row.get(8)?;
    let bundle_id: Option<String> = row.get(9)?;
    let source_app = (display_name.is_some() || bundle_id.is_some()).then(|| SourceApp {
        display_name,
        bundle_id,
    });

    Ok(ClipboardItem {
        id: row.get(0)?,
        content,
        content_hash: row.get(3)?,
        source_app,
        created_at: row.get(10)?,
        is_pinned: row.get::<_, i32>(11)? != 0,
        pinned_at: row.get(12)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(limit: usize) -> (tempfile::TempDir, Arc<ContentStore>, HistoryRepository) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::open(dir.path().join("images"), None).unwrap());
        let repo = HistoryRepository::open_in_memory(store.clone(), limit).unwrap();
        (dir, store, repo)
    }

    fn text_at(text: &str, created_at: i64) -> ClipboardItem {
        ClipboardItem::text(text.to_string(), None).with_created_at(created_at)
    }

    fn image_item(store: &ContentStore, bytes: &[u8]) -> ClipboardItem {
        let blob = store.put(bytes, ImageFormat::Png).unwrap();
        ClipboardItem::image(
            ImageRef {
                path: blob.path,
                width: blob.width,
                height: blob.height,
                format: blob.format,
            },
            blob.hash,
            Some(SourceApp::new("Preview", "com.apple.Preview")),
        )
    }

    fn texts(items: &[ClipboardItem]) -> Vec<String> {
        items.iter().map(|i| i.display_text()).collect()
    }

    #[test]
    fn test_insert_if_new_dedupes_by_hash() {
        let (_dir, _store, repo) = setup(10);
        let first = ClipboardItem::text("hello".into(), None);
        let again = ClipboardItem::text("hello".into(), None);

        assert!(repo.insert_if_new(&first).unwrap());
        assert!(!repo.insert_if_new(&again).unwrap());
        assert_eq!(repo.count().unwrap(), 1);
        assert!(repo.contains_hash(&first.content_hash).unwrap());

        let stored = repo.get(&first.id).unwrap().unwrap();
        assert_eq!(stored, first);
        assert!(repo.get(&again.id).unwrap().is_none());
    }

    #[test]
    fn test_retention_keeps_most_recent() {
        let limit = 5;
        let (_dir, _store, repo) = setup(limit);
        for i in 0..limit + 5 {
            repo.insert_if_new(&text_at(&format!("item {}", i), 1_000 + i as i64))
                .unwrap();
        }

        let items = repo.all().unwrap();
        assert_eq!(items.len(), limit);
        assert_eq!(
            texts(&items),
            vec!["item 9", "item 8", "item 7", "item 6", "item 5"]
        );
    }

    #[test]
    fn test_pinned_items_survive_trimming() {
        let limit = 3;
        let (_dir, _store, repo) = setup(limit);
        let oldest = text_at("oldest", 1);
        repo.insert_if_new(&oldest).unwrap();
        repo.insert_if_new(&text_at("b", 2)).unwrap();
        repo.insert_if_new(&text_at("c", 3)).unwrap();
        assert_eq!(repo.toggle_pin(&oldest.id).unwrap(), Some(true));

        for i in 0..limit {
            repo.insert_if_new(&text_at(&format!("new {}", i), 10 + i as i64))
                .unwrap();
        }

        assert!(repo.get(&oldest.id).unwrap().is_some());
        assert_eq!(repo.count().unwrap(), limit + 1);
        assert_eq!(repo.pinned_count().unwrap(), 1);
    }

    #[test]
    fn test_display_order_pinned_first() {
        let (_dir, _store, repo) = setup(10);
        let a = text_at("A", 1).pinned_at(200);
        let b = text_at("B", 300);
        let c = text_at("C", 2).pinned_at(100);
        for item in [&a, &b, &c] {
            repo.insert_if_new(item).unwrap();
        }

        assert_eq!(texts(&repo.all().unwrap()), vec!["A", "C", "B"]);
    }

    #[test]
    fn test_toggle_pin_sets_and_clears_pinned_at() {
        let (_dir, _store, repo) = setup(10);
        let item = text_at("pin me", 5);
        repo.insert_if_new(&item).unwrap();

        assert_eq!(repo.toggle_pin(&item.id).unwrap(), Some(true));
        let pinned = repo.get(&item.id).unwrap().unwrap();
        assert!(pinned.is_pinned);
        assert!(pinned.pinned_at.is_some());
        assert_eq!(pinned.content_hash, item.content_hash);

        assert_eq!(repo.toggle_pin(&item.id).unwrap(), Some(false));
        let unpinned = repo.get(&item.id).unwrap().unwrap();
        assert!(!unpinned.is_pinned);
        assert_eq!(unpinned.pinned_at, None);

        assert_eq!(repo.toggle_pin("missing").unwrap(), None);
    }

    #[test]
    fn test_delete_image_removes_blob() {
        let (_dir, store, repo) = setup(10);
        let item = image_item(&store, b"fake png");
        let path = item.image_ref().unwrap().path.clone();
        repo.insert_if_new(&item).unwrap();

        assert!(repo.delete(&item.id).unwrap());
        assert!(!path.exists());
        assert!(!repo.delete(&item.id).unwrap());
    }

    #[test]
    fn test_trim_evicts_image_blobs() {
        let (_dir, store, repo) = setup(1);
        let image = image_item(&store, b"old image").with_created_at(1);
        let path = image.image_ref().unwrap().path.clone();
        repo.insert_if_new(&image).unwrap();
        repo.insert_if_new(&text_at("newer", 2)).unwrap();

        assert!(!path.exists());
        assert_eq!(texts(&repo.all().unwrap()), vec!["newer"]);
    }

    #[test]
    fn test_clear_all_removes_items_and_blobs() {
        let (_dir, store, repo) = setup(10);
        let image = image_item(&store, b"img");
        repo.insert_if_new(&image).unwrap();
        repo.insert_if_new(&text_at("text", 1)).unwrap();

        assert_eq!(repo.clear_all().unwrap(), 2);
        assert_eq!(repo.count().unwrap(), 0);
        assert!(!image.image_ref().unwrap().path.exists());
    }

    #[tokio::test]
    async fn test_clear_all_in_background() {
        let (_dir, _store, repo) = setup(10);
        let repo = Arc::new(repo);
        repo.insert_if_new(&text_at("one", 1)).unwrap();
        repo.insert_if_new(&text_at("two", 2)).unwrap();

        let removed = repo.clone().clear_all_in_background().await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count().unwrap(), 0);
    }

    #[test]
    fn test_search_and_source_filter() {
        let (_dir, store, repo) = setup(10);
        let notes = SourceApp::new("Notes", "com.apple.Notes");
        repo.insert_if_new(
            &ClipboardItem::text("Grocery LIST".into(), Some(notes.clone())).with_created_at(1),
        )
        .unwrap();
        repo.insert_if_new(&text_at("unrelated", 2)).unwrap();
        repo.insert_if_new(&image_item(&store, b"shot").with_created_at(3))
            .unwrap();

        let found = repo.list(&HistoryQuery::search("list")).unwrap();
        assert_eq!(texts(&found), vec!["Grocery LIST"]);

        let images = repo.list(&HistoryQuery::search("image")).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].kind(), ItemKind::Image);

        let by_app = repo
            .list(&HistoryQuery::source(SourceFilter {
                display_name: "Notes".into(),
                bundle_id: Some("com.apple.Notes".into()),
            }))
            .unwrap();
        assert_eq!(texts(&by_app), vec!["Grocery LIST"]);
    }

    #[test]
    fn test_source_filter_falls_back_to_display_name() {
        let legacy = ClipboardItem::text(
            "legacy".into(),
            Some(SourceApp {
                display_name: Some("Terminal".into()),
                bundle_id: None,
            }),
        );
        let filter = SourceFilter {
            display_name: "Terminal".into(),
            bundle_id: None,
        };
        assert!(filter.matches(&legacy));

        let strict = SourceFilter {
            display_name: "Terminal".into(),
            bundle_id: Some("com.apple.Terminal".into()),
        };
        assert!(!strict.matches(&legacy));
    }

    #[test]
    fn test_app_statistics_sorted_by_count() {
        let (_dir, _store, repo) = setup(10);
        let safari = SourceApp::new("Safari", "com.apple.Safari");
        let mail = SourceApp::new("Mail", "com.apple.mail");
        for (i, app) in [&safari, &mail, &safari].into_iter().enumerate() {
            repo.insert_if_new(&ClipboardItem::text(format!("t{}", i), Some(app.clone())))
                .unwrap();
        }
        repo.insert_if_new(&text_at("anonymous", 9)).unwrap();

        let stats = repo.app_statistics().unwrap();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].display_name, "Safari");
        assert_eq!(stats[0].count, 2);
        assert_eq!(stats[0].bundle_id.as_deref(), Some("com.apple.Safari"));
        assert_eq!(repo.top_apps(1).unwrap(), vec![stats[0].clone()]);
        assert_eq!(stats[1].as_filter().display_name, "Mail");
    }

    #[test]
    fn test_referenced_image_paths() {
        let (_dir, store, repo) = setup(10);
        let image = image_item(&store, b"kept");
        repo.insert_if_new(&image).unwrap();
        repo.insert_if_new(&text_at("text", 1)).unwrap();

        let paths = repo.referenced_image_paths().unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths.contains(&image.image_ref().unwrap().path));
    }

    #[test]
    fn test_settings_roundtrip_and_fallback() {
        let (_dir, _store, repo) = setup(10);
        assert_eq!(repo.load_settings(), Settings::default());

        let custom = Settings {
            max_history_count: 50,
            skip_large_images: false,
            ..Settings::default()
        };
        repo.save_settings(&custom).unwrap();
        assert_eq!(repo.load_settings(), custom);

        repo.set_setting(SETTINGS_KEY, "{ not json").unwrap();
        assert_eq!(repo.load_settings(), Settings::default());
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(ContentStore::open(dir.path().join("images"), None).unwrap());
        let item = text_at("persisted", 42);
        {
            let repo = HistoryRepository::open(dir.path(), store.clone(), 10).unwrap();
            repo.insert_if_new(&item).unwrap();
        }
        let repo = HistoryRepository::open(dir.path(), store, 10).unwrap();
        assert_eq!(repo.get(&item.id).unwrap(), Some(item));
    }
}
