pub(crate) mod cache;
pub(crate) mod config;
pub(crate) mod library;
pub(crate) mod sync;

use std::path::PathBuf;

use anisync_lib::{ApplicationSettings, ServicePaths, Services};

use crate::error::CliError;

/// Paths and flags shared by every command.
pub(crate) struct AppContext {
    pub settings_path: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub quiet: bool,
}

impl AppContext {
    pub(crate) fn settings(&self) -> ApplicationSettings {
        match &self.settings_path {
            Some(path) => ApplicationSettings::new(path.clone()),
            None => ApplicationSettings::default(),
        }
    }

    /// Open the store, client, image cache and engine.
    pub(crate) fn services(&self) -> Result<Services, CliError> {
        let mut paths = ServicePaths::default();
        if let Some(db) = &self.db {
            paths.database = db.clone();
        }
        if let Some(dir) = &self.cache_dir {
            paths.image_dir = dir.clone();
        }
        Ok(Services::build(self.settings(), paths)?)
    }
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime, CliError> {
    tokio::runtime::Runtime::new().map_err(|e| CliError::runtime(e.to_string()))
}

pub(crate) fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;
    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Render unix milliseconds in local time.
pub(crate) fn format_timestamp(ms: i64) -> String {
    match chrono::DateTime::from_timestamp_millis(ms) {
        Some(at) => at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string(),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_use_binary_units() {
        assert_eq!(format_bytes(512), "512 bytes");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(256 * 1024 * 1024), "256.0 MiB");
    }

    #[test]
    fn invalid_timestamp_renders_dash() {
        assert_eq!(format_timestamp(i64::MAX), "-");
    }
}
