use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use engine_logging::{engine_debug, engine_warn};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const OUTPUT_DIR_KEY: &str = "output_dir";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings path {0:?} has no parent directory or file name")]
    InvalidPath(PathBuf),
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write settings: {0}")]
    Persist(#[from] PersistError),
}

/// Small key/value bag persisted as a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    values: Map<String, Value>,
}

impl Settings {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.values
            .get(OUTPUT_DIR_KEY)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    }

    pub fn set_output_dir(&mut self, dir: &Path) {
        self.set(OUTPUT_DIR_KEY, dir.to_string_lossy().into_owned());
    }
}

/// File-backed settings. All writers of one file should share one store so
/// read-modify-write cycles go through the same lock.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or corrupt files load as empty settings.
    pub fn load(&self) -> Settings {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_unlocked()
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write_unlocked(settings)
    }

    /// Loads, applies `mutate`, and saves while holding the store lock.
    pub fn update<F>(&self, mutate: F) -> Result<Settings, SettingsError>
    where
        F: FnOnce(&mut Settings),
    {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut settings = self.read_unlocked();
        mutate(&mut settings);
        self.write_unlocked(&settings)?;
        Ok(settings)
    }

    fn read_unlocked(&self) -> Settings {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_debug!("No settings file at {:?}", self.path);
                return Settings::default();
            }
            Err(err) => {
                engine_warn!("Failed to read settings from {:?}: {}", self.path, err);
                return Settings::default();
            }
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(values)) => Settings { values },
            Ok(other) => {
                engine_warn!(
                    "Ignoring settings in {:?}: expected an object, found {}",
                    self.path,
                    other
                );
                Settings::default()
            }
            Err(err) => {
                engine_warn!("Ignoring corrupt settings in {:?}: {}", self.path, err);
                Settings::default()
            }
        }
    }

    fn write_unlocked(&self, settings: &Settings) -> Result<(), SettingsError> {
        let (Some(dir), Some(name)) = (
            self.path.parent(),
            self.path.file_name().and_then(|n| n.to_str()),
        ) else {
            return Err(SettingsError::InvalidPath(self.path.clone()));
        };
        let dir = if dir.as_os_str().is_empty() {
            Path::new(".")
        } else {
            dir
        };

        let content = serde_json::to_vec_pretty(&settings.values)?;
        AtomicFileWriter::new(dir.to_path_buf()).write(name, &content)?;
        Ok(())
    }
}
