//! Configuration loading for nvbridge.
//!
//! Settings come from `~/.nvbridge/config.toml` (or an explicit path) and
//! are passed by value into the adapter; nothing reads configuration
//! through a global.
//!
//! # Configuration File
//!
//! ```toml
//! [editor]
//! path = "nvim"
//! init_script = "/home/user/.config/nvim/embed.vim"
//!
//! [font]
//! family = "DejaVu Sans Mono"
//! size = 14.0
//!
//! # Optional: force a fixed grid, ignoring viewport and font changes
//! [grid]
//! rows = 40
//! cols = 120
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::GridSize;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Editor backend settings
    pub editor: EditorConfig,
    /// Font settings
    pub font: FontConfig,
    /// Optional fixed grid override
    pub grid: GridConfig,
}

/// Editor backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Path to the editor binary
    pub path: String,
    /// Launch arguments; `--embed` routes RPC over stdio
    pub args: Vec<String>,
    /// Initialization script passed with `-u`
    pub init_script: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            path: "nvim".to_string(),
            args: vec!["--embed".to_string()],
            init_script: None,
        }
    }
}

/// Font settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub family: String,
    pub size: f32,
}

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            family: "DejaVu Sans Mono".to_string(),
            size: 14.0,
        }
    }
}

/// Fixed grid override; active only when both dimensions are set
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GridConfig {
    pub rows: Option<u16>,
    pub cols: Option<u16>,
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// The forced grid size, when configured.
    pub fn fixed_grid(&self) -> Option<GridSize> {
        match (self.grid.rows, self.grid.cols) {
            (Some(rows), Some(cols)) => Some(GridSize { rows, cols }),
            _ => None,
        }
    }

    /// Default config file path
    fn default_path() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".nvbridge").join("config.toml"))
    }

    /// Directory for logs and other adapter files
    pub fn data_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".nvbridge"))
    }
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_launch_an_embedded_editor() {
        let config = Config::default();
        assert_eq!(config.editor.path, "nvim");
        assert_eq!(config.editor.args, vec!["--embed".to_string()]);
        assert!(config.fixed_grid().is_none());
    }

    #[test]
    fn parses_partial_files_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [font]
            family = "Iosevka"
            "#,
        )
        .unwrap();
        assert_eq!(config.font.family, "Iosevka");
        assert_eq!(config.font.size, 14.0);
        assert_eq!(config.editor.path, "nvim");
    }

    #[test]
    fn fixed_grid_requires_both_dimensions() {
        let partial: Config = toml::from_str("[grid]\nrows = 40\n").unwrap();
        assert!(partial.fixed_grid().is_none());

        let full: Config = toml::from_str("[grid]\nrows = 40\ncols = 120\n").unwrap();
        assert_eq!(full.fixed_grid(), Some(GridSize { rows: 40, cols: 120 }));
    }
}
