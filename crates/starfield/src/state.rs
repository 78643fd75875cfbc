use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use theme::{parse_preference, ThemeMode};

/// Values remembered between launches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    /// Raw saved preference. Unknown values are kept as-is and read as "unset".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

impl AppState {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read state file at {}", path.display()))?;
            let state: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse state file at {}", path.display()))?;
            Ok(state)
        } else {
            Ok(Self::default())
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("state path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "failed to prepare directory for state file at {}",
                dir.display()
            )
        })?;
        let serialized = toml::to_string_pretty(self)
            .with_context(|| "failed to serialize state file to TOML".to_string())?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write state file to {}", path.display()))?;
        Ok(())
    }

    pub fn saved_theme(&self) -> Option<ThemeMode> {
        parse_preference(self.theme.as_deref())
    }

    pub fn set_theme(&mut self, mode: ThemeMode) {
        self.theme = Some(mode.as_str().to_string());
    }
}

/// Loads, updates, and writes back the theme preference.
pub fn save_theme(path: &Path, mode: ThemeMode) -> Result<()> {
    let mut state = AppState::load_or_default(path)?;
    if state.saved_theme() == Some(mode) {
        return Ok(());
    }
    state.set_theme(mode);
    state.persist(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_default() {
        let root = TempDir::new().unwrap();
        let state = AppState::load_or_default(&root.path().join("state.toml")).unwrap();
        assert_eq!(state, AppState::default());
        assert_eq!(state.saved_theme(), None);
    }

    #[test]
    fn persists_theme_preference() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("nested/state.toml");

        save_theme(&path, ThemeMode::Dark).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("theme = \"dark\""));

        save_theme(&path, ThemeMode::Light).unwrap();
        let state = AppState::load_or_default(&path).unwrap();
        assert_eq!(state.saved_theme(), Some(ThemeMode::Light));
    }

    #[test]
    fn unknown_saved_value_reads_as_unset() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("state.toml");
        fs::write(&path, "theme = \"auto\"\n").unwrap();
        let state = AppState::load_or_default(&path).unwrap();
        assert_eq!(state.theme.as_deref(), Some("auto"));
        assert_eq!(state.saved_theme(), None);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("state.toml");
        fs::write(&path, "theme = [").unwrap();
        assert!(AppState::load_or_default(&path).is_err());
    }
}
