//! User settings and on-disk layout.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Directory holding the journal database, like `.git/`.
pub const DAYBOOK_DIR: &str = ".daybook";

/// Database file inside [`DAYBOOK_DIR`].
pub const DATABASE_FILE: &str = "journal.db";

/// Prefix applied to every key written to a backend.
pub const KEY_PREFIX: &str = "daily_journal_";

/// Default store quota, matching a browser's localStorage budget.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Format version stamped on exports.
pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceMode {
    #[default]
    Auto,
    Mobile,
    Desktop,
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceMode::Auto => write!(f, "auto"),
            DeviceMode::Mobile => write!(f, "mobile"),
            DeviceMode::Desktop => write!(f, "desktop"),
        }
    }
}

impl std::str::FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DeviceMode::Auto),
            "mobile" => Ok(DeviceMode::Mobile),
            "desktop" => Ok(DeviceMode::Desktop),
            _ => Err(format!("Invalid device mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            _ => Err(format!("Invalid theme: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Txt,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Txt => write!(f, "txt"),
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "txt" | "text" => Ok(ExportFormat::Txt),
            _ => Err(format!("Invalid export format: {}", s)),
        }
    }
}

/// Preferences persisted under the `settings` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub device_mode: DeviceMode,
    pub theme: Theme,
    pub auto_save: bool,
    pub export_format: ExportFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device_mode: DeviceMode::Auto,
            theme: Theme::Light,
            auto_save: true,
            export_format: ExportFormat::Json,
        }
    }
}

impl Settings {
    /// Set one field by its name, as typed on the command line.
    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), String> {
        match field {
            "deviceMode" | "device-mode" | "device_mode" => self.device_mode = value.parse()?,
            "theme" => self.theme = value.parse()?,
            "autoSave" | "auto-save" | "auto_save" => {
                self.auto_save = match value.to_lowercase().as_str() {
                    "true" | "on" | "yes" | "1" => true,
                    "false" | "off" | "no" | "0" => false,
                    _ => return Err(format!("Invalid boolean: {}", value)),
                }
            }
            "exportFormat" | "export-format" | "export_format" => {
                self.export_format = value.parse()?
            }
            _ => return Err(format!("Unknown setting: {}", field)),
        }
        Ok(())
    }
}

/// Find the directory that holds (or should hold) `.daybook/`.
///
/// Walks up from `start` looking for an existing `.daybook/`, and falls back
/// to `start` itself when none is found.
pub fn find_root(start: &Path) -> PathBuf {
    let mut current = start;
    loop {
        if current.join(DAYBOOK_DIR).exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) => current = parent,
            None => return start.to_path_buf(),
        }
    }
}

/// Resolve the root from an explicit override or the current directory.
pub fn resolve_root(explicit: Option<PathBuf>) -> PathBuf {
    match explicit {
        Some(dir) => dir,
        None => {
            let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
            find_root(&cwd)
        }
    }
}
