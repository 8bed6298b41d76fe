//! Small persistent key/value store for user preferences (`settings.json`).
//!
//! Every value is a JSON value. Reads never fail: a missing or mistyped key
//! falls back to the caller's default, which is then written back so the file
//! documents every setting that has been consulted.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::storage;

pub struct SettingsStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

/// `~/.config/cachesync/settings.json`
pub fn settings_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cachesync")?;
    Ok(xdg_dirs.place_config_file("settings.json")?)
}

impl SettingsStore {
    pub fn open_default() -> Result<Self> {
        Ok(Self::open(settings_path()?))
    }

    /// Open the store at `path`. A missing file starts empty; an unreadable
    /// or corrupt one is reset to `{}`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Value>(&data) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    tracing::error!("settings file {} is corrupt; resetting", path.display());
                    let empty = Map::new();
                    write_values(&path, &empty);
                    empty
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                tracing::error!("cannot read settings file {}: {}; resetting", path.display(), e);
                let empty = Map::new();
                write_values(&path, &empty);
                empty
            }
        };
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored value for `key`, or `default` (persisted) when absent or of the wrong type.
    pub fn get<T>(&self, key: &str, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(stored) = values.get(key) {
            if let Ok(v) = serde_json::from_value::<T>(stored.clone()) {
                return v;
            }
            tracing::warn!("setting {} has unexpected type; using default", key);
        }
        match serde_json::to_value(&default) {
            Ok(json) => {
                values.insert(key.to_string(), json);
                write_values(&self.path, &values);
            }
            Err(e) => tracing::error!("cannot encode default for setting {}: {}", key, e),
        }
        default
    }

    /// Raw JSON value for `key`, without inserting anything.
    pub fn get_raw(&self, key: &str) -> Option<Value> {
        self.values
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("cannot encode setting {}: {}", key, e);
                return;
            }
        };
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), json);
        write_values(&self.path, &values);
    }
}

/// Pretty-printed write through a temp file and rename. Failures are logged only.
fn write_values(path: &Path, values: &Map<String, Value>) {
    let result = (|| -> Result<()> {
        storage::ensure_parent_dir(path)?;
        let data = serde_json::to_string_pretty(values)?;
        let tmp = storage::temp_path(path);
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    })();
    if let Err(e) = result {
        tracing::error!("failed to write settings to {}: {:#}", path.display(), e);
    }
}
