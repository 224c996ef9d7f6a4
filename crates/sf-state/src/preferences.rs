//! Editor Preferences
//!
//! Persistent settings read when a document manager is created:
//! - Undo memory budget and whether undo starts enabled
//! - Clipboard lifetime across document close
//! - Writer buffer size for streaming I/O

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default undo memory budget in MiB
pub const DEFAULT_UNDO_BUDGET_MB: usize = 256;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorPreferences {
    pub undo: UndoPreferences,
    pub clipboard: ClipboardPreferences,
    pub io: IoPreferences,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoPreferences {
    /// Ceiling for undo + redo buffers (MiB)
    pub memory_budget_mb: usize,
    /// Record undo for new and loaded documents
    pub enabled_on_start: bool,
}

impl Default for UndoPreferences {
    fn default() -> Self {
        Self {
            memory_budget_mb: DEFAULT_UNDO_BUDGET_MB,
            enabled_on_start: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardPreferences {
    /// Keep clipboard content when the document is closed
    pub keep_after_close: bool,
}

impl Default for ClipboardPreferences {
    fn default() -> Self {
        Self { keep_after_close: true }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoPreferences {
    /// Samples collected per writer before a bulk flush
    pub writer_buffer_samples: usize,
}

impl Default for IoPreferences {
    fn default() -> Self {
        Self {
            writer_buffer_samples: sf_signal::WRITER_BUFFER_SAMPLES,
        }
    }
}

impl EditorPreferences {
    /// Load preferences from standard location
    pub fn load() -> Self {
        Self::load_from(Self::default_path())
    }

    /// Load preferences from specified path, defaults on any problem
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path.as_ref()) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("ignoring malformed preferences {}: {}", path.as_ref().display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> std::io::Result<()> {
        self.save_to(Self::default_path())
    }

    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> std::io::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("sampleforge"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("preferences.json")
    }

    /// Undo budget in bytes
    pub fn undo_budget_bytes(&self) -> usize {
        self.undo.memory_budget_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preferences() {
        let prefs = EditorPreferences::default();
        assert_eq!(prefs.undo.memory_budget_mb, 256);
        assert_eq!(prefs.undo_budget_bytes(), 256 * 1024 * 1024);
        assert!(prefs.undo.enabled_on_start);
        assert_eq!(prefs.io.writer_buffer_samples, sf_signal::WRITER_BUFFER_SAMPLES);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let prefs: EditorPreferences =
            serde_json::from_str(r#"{ "undo": { "memory_budget_mb": 8 } }"#).unwrap();
        assert_eq!(prefs.undo.memory_budget_mb, 8);
        assert!(prefs.undo.enabled_on_start);
        assert!(prefs.clipboard.keep_after_close);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("preferences.json");
        let mut prefs = EditorPreferences::default();
        prefs.undo.memory_budget_mb = 3;
        prefs.clipboard.keep_after_close = false;
        prefs.save_to(&path).unwrap();
        assert_eq!(EditorPreferences::load_from(&path), prefs);
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(EditorPreferences::load_from(&path), EditorPreferences::default());
        assert_eq!(
            EditorPreferences::load_from(dir.path().join("missing.json")),
            EditorPreferences::default()
        );
    }
}
