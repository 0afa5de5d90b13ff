use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment override for the data directory.
pub const DATA_DIR_ENV: &str = "CLIPSHELF_DATA_DIR";

pub const DEFAULT_HISTORY_LIMIT: usize = 200;
pub const HISTORY_LIMIT_OPTIONS: [usize; 4] = [50, 200, 500, 999];
pub const DEFAULT_LARGE_IMAGE_THRESHOLD_MB: u64 = 20;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
/// Slightly longer than one poll so the echo of our own paste is always seen
/// while suppressed.
pub const DEFAULT_PASTE_SUPPRESSION_MS: u64 = 600;

/// Resolve where history, blobs, settings and logs live.
pub fn default_data_dir() -> Option<PathBuf> {
    match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::data_dir().map(|d| d.join("clipshelf")),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredApp {
    pub bundle_id: String,
    pub display_name: String,
}

impl IgnoredApp {
    fn new(bundle_id: &str, display_name: &str) -> Self {
        Self {
            bundle_id: bundle_id.to_string(),
            display_name: display_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub monitoring_enabled: bool,
    pub ignored_apps: Vec<IgnoredApp>,
    pub ignored_types: Vec<String>,
    pub ignore_types_enabled: bool,
    pub max_history_count: usize,
    pub skip_large_images: bool,
    pub large_image_threshold_mb: u64,
    pub poll_interval_ms: u64,
    pub paste_suppression_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitoring_enabled: true,
            ignored_apps: vec![
                IgnoredApp::new("com.1password.1password", "1Password"),
                IgnoredApp::new("com.agilebits.onepassword7", "1Password 7"),
                IgnoredApp::new("com.bitwarden.desktop", "Bitwarden"),
                IgnoredApp::new("org.keepassxc.keepassxc", "KeePassXC"),
                IgnoredApp::new("com.apple.keychainaccess", "Keychain Access"),
                IgnoredApp::new("com.apple.Passwords", "Passwords"),
            ],
            ignored_types: vec![
                "org.nspasteboard.ConcealedType".to_string(),
                "org.nspasteboard.TransientType".to_string(),
                "org.nspasteboard.AutoGeneratedType".to_string(),
                "com.agilebits.onepassword".to_string(),
            ],
            ignore_types_enabled: true,
            max_history_count: DEFAULT_HISTORY_LIMIT,
            skip_large_images: true,
            large_image_threshold_mb: DEFAULT_LARGE_IMAGE_THRESHOLD_MB,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            paste_suppression_ms: DEFAULT_PASTE_SUPPRESSION_MS,
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn paste_suppression(&self) -> Duration {
        Duration::from_millis(self.paste_suppression_ms)
    }

    pub fn large_image_threshold_bytes(&self) -> u64 {
        self.large_image_threshold_mb.saturating_mul(1024 * 1024)
    }

    /// Retention limit actually enforced. A stored `0` would evict every
    /// capture the moment it lands, so the floor is one item.
    pub fn history_limit(&self) -> usize {
        self.max_history_count.max(1)
    }

    /// Byte ceiling for stored images, `None` when large images are kept.
    pub fn size_limit(&self) -> Option<u64> {
        self.skip_large_images
            .then(|| self.large_image_threshold_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.max_history_count, 200);
        assert!(HISTORY_LIMIT_OPTIONS.contains(&settings.max_history_count));
        assert_eq!(settings.poll_interval(), Duration::from_millis(500));
        assert_eq!(settings.paste_suppression(), Duration::from_millis(600));
        assert_eq!(settings.size_limit(), Some(20 * 1024 * 1024));
        assert!(settings
            .ignored_types
            .iter()
            .any(|t| t == "org.nspasteboard.ConcealedType"));
    }

    #[test]
    fn test_zero_history_limit_keeps_one_item() {
        let settings: Settings = serde_json::from_str(r#"{ "max_history_count": 0 }"#).unwrap();
        assert_eq!(settings.history_limit(), 1);
        assert_eq!(Settings::default().history_limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_size_limit_disabled() {
        let settings = Settings {
            skip_large_images: false,
            ..Settings::default()
        };
        assert_eq!(settings.size_limit(), None);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "max_history_count": 50, "ignore_types_enabled": false }"#)
                .unwrap();
        assert_eq!(settings.max_history_count, 50);
        assert!(!settings.ignore_types_enabled);
        assert_eq!(settings.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(!settings.ignored_apps.is_empty());
    }
}
