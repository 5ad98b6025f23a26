//! Client-local preferences.
//!
//! A flat string map, kept in memory or mirrored to a JSON file on every
//! write. The shell only persists the theme.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use realm_types::Theme;

use crate::error::AppError;

/// Key under which the theme is stored.
pub const THEME_KEY: &str = "collectible-theme";

/// Key/value preferences.
///
/// Cloning yields another handle to the same map.
#[derive(Debug, Clone, Default)]
pub struct Preferences {
    values: Arc<Mutex<BTreeMap<String, String>>>,
    path: Option<PathBuf>,
}

impl Preferences {
    /// Preferences that live only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Preferences backed by the JSON file at `path`.
    ///
    /// A missing file starts empty and is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(|source| {
                AppError::PreferencesFormat {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(AppError::Preferences { path, source }),
        };
        Ok(Self {
            values: Arc::new(Mutex::new(values)),
            path: Some(path),
        })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Stored value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Store `value` under `key` and persist.
    pub fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        let snapshot = {
            let mut values = self.lock();
            values.insert(key.to_owned(), value.to_owned());
            values.clone()
        };
        self.persist(&snapshot)
    }

    /// The stored theme. Anything but `dark` reads as light.
    pub fn theme(&self) -> Theme {
        Theme::from_persisted(self.get(THEME_KEY).as_deref())
    }

    /// Persist `theme`.
    pub fn set_theme(&self, theme: Theme) -> Result<(), AppError> {
        self.set(THEME_KEY, theme.as_str())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), AppError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(values).map_err(|source| {
            AppError::PreferencesFormat {
                path: path.clone(),
                source,
            }
        })?;
        std::fs::write(path, raw).map_err(|source| AppError::Preferences {
            path: path.clone(),
            source,
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_theme_values_read_as_light() {
        let prefs = Preferences::in_memory();
        assert_eq!(prefs.theme(), Theme::Light);
        prefs.set(THEME_KEY, "sepia").unwrap();
        assert_eq!(prefs.theme(), Theme::Light);
        prefs.set_theme(Theme::Dark).unwrap();
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    #[test]
    fn file_preferences_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let prefs = Preferences::open(&path).unwrap();
        assert_eq!(prefs.get(THEME_KEY), None);
        prefs.set_theme(Theme::Dark).unwrap();

        let reopened = Preferences::open(&path).unwrap();
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("dark"));
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "[1, 2").unwrap();

        let error = Preferences::open(&path).unwrap_err();
        assert!(matches!(error, AppError::PreferencesFormat { .. }));
    }
}
