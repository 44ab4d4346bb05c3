//! Persisted user settings.
//!
//! Small JSON file in the data directory remembering the last query and
//! alert preferences, so the UI comes back the way it was left.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::domain::TrainFilter;
use crate::watch::DEFAULT_INTERVAL_SECS;

/// File name inside the data directory.
pub const SETTINGS_FILE: &str = "settings.json";

/// The last query the user ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedQuery {
    /// Origin as the user typed it.
    pub from: String,
    /// Destination as the user typed it.
    pub to: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub train_type: TrainFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_query: Option<SavedQuery>,
    pub alert_email: Option<String>,
    pub watch_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            last_query: None,
            alert_email: None,
            watch_interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to write settings to {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reads and writes [`Settings`] at a fixed path.
///
/// Clones share one write lock, so concurrent [`update`](Self::update)s
/// through the same store never lose each other's changes.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Store at `<data_dir>/settings.json`.
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when the file is missing or
    /// unreadable.
    pub async fn load(&self) -> Settings {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Settings::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read settings");
                return Settings::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "invalid settings file, using defaults");
                Settings::default()
            }
        }
    }

    /// Write settings, creating the directory if needed.
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock().await;
        self.write(settings).await
    }

    async fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }
        // Readers don't take the lock, so never leave a half-written file.
        let json = serde_json::to_string_pretty(settings)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }

    /// Load, apply `f`, save, all under the write lock.
    pub async fn update<F>(&self, f: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await;
        f(&mut settings);
        self.write(&settings).await?;
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn query() -> SavedQuery {
        SavedQuery {
            from: "南宁".to_string(),
            to: "桂林".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            train_type: TrainFilter::Emu,
        }
    }

    #[tokio::test]
    async fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        assert_eq!(store.load().await, Settings::default());
        assert_eq!(store.load().await.watch_interval_secs, 300);
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(&dir.path().join("nested"));

        let settings = Settings {
            last_query: Some(query()),
            alert_email: Some("me@example.com".to_string()),
            watch_interval_secs: 120,
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await, settings);
    }

    #[tokio::test]
    async fn invalid_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        std::fs::write(store.path(), "not json").unwrap();
        assert_eq!(store.load().await, Settings::default());
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        std::fs::write(store.path(), r#"{"alert_email":"a@b.cn"}"#).unwrap();

        let loaded = store.load().await;
        assert_eq!(loaded.alert_email.as_deref(), Some("a@b.cn"));
        assert_eq!(loaded.watch_interval_secs, DEFAULT_INTERVAL_SECS);
        assert!(loaded.last_query.is_none());
    }

    #[tokio::test]
    async fn update_persists() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path());
        store.update(|s| s.last_query = Some(query())).await.unwrap();
        assert_eq!(store.load().await.last_query, Some(query()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_not_lost() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::in_dir(dir.path());

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store.update(|s| s.watch_interval_secs += 1).await.unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(store.load().await.watch_interval_secs, DEFAULT_INTERVAL_SECS + 20);
    }
}
