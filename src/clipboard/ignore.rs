use std::collections::HashSet;

use log::info;

use super::pasteboard::SourceApp;
use crate::config::Settings;

/// Filters clipboard changes by source application and by declared type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnorePolicy {
    ignored_bundle_ids: HashSet<String>,
    ignored_types: HashSet<String>,
    types_enabled: bool,
}

impl IgnorePolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            ignored_bundle_ids: settings
                .ignored_apps
                .iter()
                .map(|app| app.bundle_id.clone())
                .collect(),
            ignored_types: settings.ignored_types.iter().cloned().collect(),
            types_enabled: settings.ignore_types_enabled,
        }
    }

    pub fn ignores_app(&self, app: Option<&SourceApp>) -> bool {
        let Some(bundle_id) = app.and_then(|a| a.bundle_id.as_deref()) else {
            return false;
        };
        let ignored = self.ignored_bundle_ids.contains(bundle_id);
        if ignored {
            info!("Ignoring copy from {}", bundle_id);
        }
        ignored
    }

    pub fn ignores_types(&self, types: &[String]) -> bool {
        if !self.types_enabled {
            return false;
        }
        match types.iter().find(|t| self.ignored_types.contains(t.as_str())) {
            Some(t) => {
                info!("Ignoring clipboard type {}", t);
                true
            }
            None => false,
        }
    }

    pub fn should_ignore(&self, app: Option<&SourceApp>, types: &[String]) -> bool {
        self.ignores_app(app) || self.ignores_types(types)
    }
}
