//! Process-wide application settings.
//!
//! Stored as TOML (default `~/.config/anisync/settings.toml`), loaded on
//! first access and written back atomically after every mutation. Options
//! are addressed by dotted names such as `sync.intervalSeconds`, which map
//! onto `[sync] intervalSeconds = ...` in the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use anisync_core::{APPLICATION_VERSION, DEFAULT_API_BASE, DEFAULT_MEDIA_BASE};
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Environment variable overriding `api.basePath`.
pub const API_BASE_ENV: &str = "ANISYNC_API_BASE";
/// Environment variable overriding `media.basePath`.
pub const MEDIA_BASE_ENV: &str = "ANISYNC_MEDIA_BASE";

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30 * 60;
const MIN_SYNC_INTERVAL_SECS: u64 = 60;
const DEFAULT_IMAGE_BUDGET: u64 = 256 * 1024 * 1024;

/// Canonical path to the settings file: `~/.config/anisync/settings.toml`.
pub fn settings_path() -> PathBuf {
    let config = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    config.join("anisync").join("settings.toml")
}

/// Default database location: `~/.local/share/anisync/library.db`.
pub fn default_database_path() -> PathBuf {
    let data = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    data.join("anisync").join("library.db")
}

/// Default image cache directory: `~/.cache/anisync/images`.
pub fn default_image_cache_dir() -> PathBuf {
    let cache = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
    cache.join("anisync").join("images")
}

/// A recognized option name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    SyncInterval,
    WifiOnly,
    ImageBudget,
    ApiBase,
    MediaBase,
    AppVersion,
}

impl SettingKey {
    pub fn all() -> &'static [SettingKey] {
        &[
            Self::SyncInterval,
            Self::WifiOnly,
            Self::ImageBudget,
            Self::ApiBase,
            Self::MediaBase,
            Self::AppVersion,
        ]
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SyncInterval => "sync.intervalSeconds",
            Self::WifiOnly => "sync.wifiOnly",
            Self::ImageBudget => "cache.imageBudgetBytes",
            Self::ApiBase => "api.basePath",
            Self::MediaBase => "media.basePath",
            Self::AppVersion => "app.version",
        }
    }

    pub fn is_read_only(self) -> bool {
        matches!(self, Self::AppVersion)
    }
}

impl fmt::Display for SettingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SettingKey {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SettingsError::UnknownKey(s.to_string()))
    }
}

/// A setting value as exposed to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Integer(u64),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

// ── File format ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SyncSection {
    interval_seconds: u64,
    wifi_only: bool,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            wifi_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CacheSection {
    image_budget_bytes: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            image_budget_bytes: DEFAULT_IMAGE_BUDGET,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BasePathSection {
    base_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct SettingsFile {
    sync: SyncSection,
    cache: CacheSection,
    api: BasePathSection,
    media: BasePathSection,
}

impl Default for SettingsFile {
    fn default() -> Self {
        Self {
            sync: SyncSection::default(),
            cache: CacheSection::default(),
            api: BasePathSection {
                base_path: DEFAULT_API_BASE.to_string(),
            },
            media: BasePathSection {
                base_path: DEFAULT_MEDIA_BASE.to_string(),
            },
        }
    }
}

// ── Settings store ──────────────────────────────────────────────────────────

/// Lazily loaded, persisted-on-write application settings.
#[derive(Debug)]
pub struct ApplicationSettings {
    path: PathBuf,
    values: OnceLock<RwLock<SettingsFile>>,
    use_env: bool,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self::new(settings_path())
    }
}

impl ApplicationSettings {
    /// Settings backed by `path`. Nothing is read until first access.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            values: OnceLock::new(),
            use_env: true,
        }
    }

    /// Ignore environment overrides. Tests use this to stay hermetic.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn values(&self) -> &RwLock<SettingsFile> {
        self.values
            .get_or_init(|| RwLock::new(load_file(&self.path)))
    }

    fn snapshot(&self) -> Result<SettingsFile, SettingsError> {
        self.values()
            .read()
            .map(|v| v.clone())
            .map_err(|_| SettingsError::Poisoned)
    }

    /// Current value of a recognized option.
    pub fn get(&self, key: SettingKey) -> Result<SettingValue, SettingsError> {
        let file = self.snapshot()?;
        Ok(match key {
            SettingKey::SyncInterval => SettingValue::Integer(file.sync.interval_seconds),
            SettingKey::WifiOnly => SettingValue::Bool(file.sync.wifi_only),
            SettingKey::ImageBudget => SettingValue::Integer(file.cache.image_budget_bytes),
            SettingKey::ApiBase => SettingValue::Text(self.env_or(API_BASE_ENV, file.api.base_path)),
            SettingKey::MediaBase => {
                SettingValue::Text(self.env_or(MEDIA_BASE_ENV, file.media.base_path))
            }
            SettingKey::AppVersion => SettingValue::Text(APPLICATION_VERSION.to_string()),
        })
    }

    /// Parse, validate and persist a new value.
    pub fn set(&self, key: SettingKey, raw: &str) -> Result<SettingValue, SettingsError> {
        if key.is_read_only() {
            return Err(SettingsError::ReadOnly(key.name().to_string()));
        }
        let raw = raw.trim();
        let lock = self.values();
        let mut file = lock.write().map_err(|_| SettingsError::Poisoned)?;
        let mut next = file.clone();

        let value = match key {
            SettingKey::SyncInterval => {
                let secs = parse_integer(key, raw)?;
                if secs < MIN_SYNC_INTERVAL_SECS {
                    return Err(SettingsError::invalid(
                        key.name(),
                        raw,
                        format!("must be at least {MIN_SYNC_INTERVAL_SECS}"),
                    ));
                }
                next.sync.interval_seconds = secs;
                SettingValue::Integer(secs)
            }
            SettingKey::WifiOnly => {
                let b = parse_bool(key, raw)?;
                next.sync.wifi_only = b;
                SettingValue::Bool(b)
            }
            SettingKey::ImageBudget => {
                let bytes = parse_integer(key, raw)?;
                next.cache.image_budget_bytes = bytes;
                SettingValue::Integer(bytes)
            }
            SettingKey::ApiBase => {
                next.api.base_path = parse_base_path(key, raw)?;
                SettingValue::Text(next.api.base_path.clone())
            }
            SettingKey::MediaBase => {
                next.media.base_path = parse_base_path(key, raw)?;
                SettingValue::Text(next.media.base_path.clone())
            }
            SettingKey::AppVersion => {
                return Err(SettingsError::ReadOnly(key.name().to_string()));
            }
        };

        save_file(&self.path, &next)?;
        *file = next;
        log::debug!("Setting {} = {}", key, value);
        Ok(value)
    }

    /// Every option with its current value, in display order.
    pub fn entries(&self) -> Result<Vec<(SettingKey, SettingValue)>, SettingsError> {
        SettingKey::all()
            .iter()
            .map(|&k| self.get(k).map(|v| (k, v)))
            .collect()
    }

    pub fn sync_interval(&self) -> Duration {
        let secs = self
            .snapshot()
            .map(|f| f.sync.interval_seconds)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        Duration::from_secs(secs.max(MIN_SYNC_INTERVAL_SECS))
    }

    pub fn wifi_only(&self) -> bool {
        self.snapshot().map(|f| f.sync.wifi_only).unwrap_or(false)
    }

    pub fn image_budget_bytes(&self) -> u64 {
        self.snapshot()
            .map(|f| f.cache.image_budget_bytes)
            .unwrap_or(DEFAULT_IMAGE_BUDGET)
    }

    pub fn api_base(&self) -> String {
        match self.get(SettingKey::ApiBase) {
            Ok(SettingValue::Text(s)) => s,
            _ => DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn media_base(&self) -> String {
        match self.get(SettingKey::MediaBase) {
            Ok(SettingValue::Text(s)) => s,
            _ => DEFAULT_MEDIA_BASE.to_string(),
        }
    }

    fn env_or(&self, var: &str, fallback: String) -> String {
        if !self.use_env {
            return fallback;
        }
        std::env::var(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(fallback)
    }
}

fn load_file(path: &Path) -> SettingsFile {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return SettingsFile::default(),
    };
    match toml::from_str(&contents) {
        Ok(file) => file,
        Err(e) => {
            log::warn!(
                "Ignoring unreadable settings file {}: {}",
                path.display(),
                e
            );
            SettingsFile::default()
        }
    }
}

/// Write atomically: serialize to a sibling temp file, then rename.
fn save_file(path: &Path, file: &SettingsFile) -> Result<(), SettingsError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let serialized = toml::to_string_pretty(file)?;
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, &serialized)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn parse_integer(key: SettingKey, raw: &str) -> Result<u64, SettingsError> {
    raw.parse()
        .map_err(|_| SettingsError::invalid(key.name(), raw, "expected a non-negative integer"))
}

fn parse_bool(key: SettingKey, raw: &str) -> Result<bool, SettingsError> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(SettingsError::invalid(key.name(), raw, "expected true or false")),
    }
}

fn parse_base_path(key: SettingKey, raw: &str) -> Result<String, SettingsError> {
    if !(raw.starts_with("https://") || raw.starts_with("http://")) {
        return Err(SettingsError::invalid(
            key.name(),
            raw,
            "expected an http(s) URL",
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
