use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::domain::GVError;
use crate::paginate::DEFAULT_PAGE_SIZE;

pub const SETTINGS_VERSION: u64 = 2;
pub const DEFAULT_SETTINGS_PATH: &str = "~/.config/gridview/settings.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

/// A saved filter, applied with the number keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickFilter {
    pub label: String,
    pub dataset: String,
    pub filter: String,
}

impl QuickFilter {
    pub fn new(label: &str, dataset: &str, filter: &str) -> Self {
        QuickFilter {
            label: label.to_string(),
            dataset: dataset.to_string(),
            filter: filter.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub version: u64,
    pub theme: Theme,
    pub page_size: usize,
    pub dataset: Option<String>,
    pub quick_filters: Vec<QuickFilter>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            version: SETTINGS_VERSION,
            theme: Theme::Light,
            page_size: DEFAULT_PAGE_SIZE,
            dataset: None,
            quick_filters: vec![
                QuickFilter::new("Technology Companies", "companies", "industry equal Technology"),
                QuickFilter::new("Located in New York", "companies", "location equal New York"),
                QuickFilter::new("Engineering", "employees", "department equal Engineering"),
                QuickFilter::new("Active Years", "financial_years", "status equal Active"),
            ],
        }
    }
}

pub fn default_path() -> PathBuf {
    expand_path(DEFAULT_SETTINGS_PATH)
}

/// `~` and environment variables; the raw string when expansion fails.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Could not expand {path}: {e}");
            PathBuf::from(path)
        }
    }
}

impl Settings {
    /// Defaults when the file does not exist; older layouts are migrated.
    pub fn load(path: &Path) -> Result<Self, GVError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {:?}, using defaults", path);
                return Ok(Settings::default());
            }
            Err(e) => return Err(e.into()),
        };
        let document: Value = serde_json::from_str(&raw)?;
        let settings: Settings = serde_json::from_value(migrate(document)?)?;
        debug!("Loaded settings {:?}", settings);
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<(), GVError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let document = Settings {
            version: SETTINGS_VERSION,
            ..self.clone()
        };
        fs::write(path, serde_json::to_string_pretty(&document)?)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }
}

/// Version 1 was the flat key/value layout of the browser pages
/// (`recordsPerPage`, `lastSection`, `quickFilters` with `field/operator/value`).
fn migrate(document: Value) -> Result<Value, GVError> {
    let Value::Object(mut map) = document else {
        return Err(GVError::Settings("expected a JSON object".into()));
    };
    let version = map.get("version").and_then(Value::as_u64).unwrap_or(1);
    if version > SETTINGS_VERSION {
        return Err(GVError::Settings(format!(
            "settings version {version} is newer than supported version {SETTINGS_VERSION}"
        )));
    }
    if version < 2 {
        map = migrate_v1(map);
        info!("Migrated settings from version {version} to {SETTINGS_VERSION}");
    }
    Ok(Value::Object(map))
}

fn migrate_v1(mut map: Map<String, Value>) -> Map<String, Value> {
    if let Some(size) = map.remove("recordsPerPage") {
        map.insert("page_size".into(), size);
    }
    if let Some(section) = map.remove("lastSection") {
        map.insert("dataset".into(), section);
    }
    if let Some(Value::Array(old)) = map.remove("quickFilters") {
        let converted: Vec<Value> = old
            .iter()
            .filter_map(|q| {
                let get = |key: &str| q.get(key).and_then(Value::as_str);
                Some(serde_json::json!({
                    "label": get("label")?,
                    "dataset": get("dataset").unwrap_or("companies"),
                    "filter": format!("{} {} {}", get("field")?, get("operator")?, get("value")?),
                }))
            })
            .collect();
        map.insert("quick_filters".into(), Value::Array(converted));
    }
    if let Some(dark) = map.remove("darkMode") {
        let theme = if dark.as_bool().unwrap_or(false) { "dark" } else { "light" };
        map.insert("theme".into(), Value::from(theme));
    }
    map.remove("sidebarCollapsed");
    map.insert("version".into(), Value::from(SETTINGS_VERSION));
    map
}
