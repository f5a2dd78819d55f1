//! Application settings stored as TOML in the platform config directory.

use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use inquire::Text;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::SettingsError;

const DEFAULT_DATA_ROOT: &str = "~/Documents/Invoices";

fn default_data_root() -> String {
    DEFAULT_DATA_ROOT.to_string()
}

fn default_typst_bin() -> String {
    "typst".to_string()
}

fn default_pdftoppm_bin() -> String {
    "pdftoppm".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Root for stored state, exported files and the editable template.
    #[serde(default = "default_data_root")]
    pub data_root: String,
    #[serde(default = "default_typst_bin")]
    pub typst_bin: String,
    #[serde(default = "default_pdftoppm_bin")]
    pub pdftoppm_bin: String,
    /// Extra font directory handed to typst (e.g. one holding ipag.ttf).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    /// Font file loaded into the editor window so CJK text renders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_font: Option<String>,
    #[serde(default = "default_true")]
    pub reveal_exports: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            typst_bin: default_typst_bin(),
            pdftoppm_bin: default_pdftoppm_bin(),
            font_dir: None,
            font_family: None,
            ui_font: None,
            reveal_exports: true,
        }
    }
}

impl AppSettings {
    pub fn root(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.data_root))
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.root().join("storage")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root().join("output")
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root().join("templates")
    }

    pub fn font_dir(&self) -> Option<PathBuf> {
        self.font_dir.as_deref().map(|p| PathBuf::from(expand_home_dir(p)))
    }

    pub fn ui_font(&self) -> Option<PathBuf> {
        self.ui_font.as_deref().map(|p| PathBuf::from(expand_home_dir(p)))
    }
}

pub fn config_path() -> PathBuf {
    if let Some(proj_dirs) = ProjectDirs::from("com", "invoice-editor", "app") {
        return proj_dirs.config_dir().join("settings.toml");
    }
    PathBuf::from("settings.toml")
}

pub fn parse_settings(content: &str) -> Result<AppSettings, SettingsError> {
    Ok(toml::from_str(content)?)
}

/// Reads settings from `path`. A missing file means defaults; a broken one
/// is reported and also falls back to defaults.
pub fn load_settings_from(path: &Path) -> AppSettings {
    if !path.exists() {
        return AppSettings::default();
    }
    let parsed = fs::read_to_string(path)
        .map_err(SettingsError::from)
        .and_then(|content| parse_settings(&content));
    match parsed {
        Ok(settings) => settings,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable settings");
            AppSettings::default()
        }
    }
}

pub fn load_settings() -> AppSettings {
    load_settings_from(&config_path())
}

pub fn save_settings_to(path: &Path, settings: &AppSettings) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, toml::to_string_pretty(settings)?)?;
    Ok(())
}

/// Interactive setup: folder picker first, text prompt as fallback.
pub fn setup_config_wizard() -> Result<AppSettings, SettingsError> {
    println!("\n--- Configuration Setup ---");
    let current = load_settings();

    println!("Opening folder picker...");
    let picked_path = rfd::FileDialog::new()
        .set_title("Select Invoice Data Directory")
        .pick_folder();

    let data_root = match picked_path {
        Some(path) => path.to_string_lossy().to_string(),
        None => {
            println!("No folder selected. Falling back to manual input.");
            Text::new("Invoice data directory:")
                .with_default(&current.data_root)
                .prompt()?
        }
    };

    let font_dir = Text::new("Font directory for PDF output (optional):")
        .with_default(current.font_dir.as_deref().unwrap_or(""))
        .prompt()?;

    let settings = AppSettings {
        data_root,
        font_dir: Some(font_dir.trim().to_string()).filter(|s| !s.is_empty()),
        ..current
    };

    let path = config_path();
    save_settings_to(&path, &settings)?;
    info!(path = %path.display(), "settings saved");
    println!("Settings saved to {}", path.display());
    Ok(settings)
}

pub fn expand_home_dir(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            let home = base_dirs.home_dir().to_string_lossy();
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
