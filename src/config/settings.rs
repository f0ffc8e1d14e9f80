//! Dashboard settings
//!
//! Manages query shaping settings stored in ~/.wardead/config.toml

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Dashboard query settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Row limit for the map, rank and timeline views
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,

    /// Per-query timeout; `None` waits indefinitely
    #[serde(default)]
    pub query_timeout_secs: Option<u64>,

    #[serde(default)]
    pub surnames: SurnameSettings,

    #[serde(default)]
    pub views: ViewNames,
}

/// How the surname pivot is queried
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurnameSettings {
    #[serde(default)]
    pub mode: SurnameMode,

    #[serde(default = "default_surname_limit")]
    pub limit: usize,

    #[serde(default = "default_surname_order_column")]
    pub order_column: String,
}

/// `top`: sorted descending and limited; `all`: unsorted and unlimited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SurnameMode {
    #[default]
    Top,
    All,
}

/// Names of the views backing each dashboard field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewNames {
    #[serde(default = "default_map_view")]
    pub map: String,

    #[serde(default = "default_rank_view")]
    pub rank: String,

    #[serde(default = "default_timeline_view")]
    pub timeline: String,

    #[serde(default = "default_surname_view")]
    pub surnames: String,
}

fn default_row_limit() -> usize {
    5000
}

fn default_surname_limit() -> usize {
    500
}

fn default_surname_order_column() -> String {
    "total_count".to_string()
}

fn default_map_view() -> String {
    "memorial_map_view".to_string()
}

fn default_rank_view() -> String {
    "stats_by_rank".to_string()
}

fn default_timeline_view() -> String {
    "daily_deaths_pivoted".to_string()
}

fn default_surname_view() -> String {
    "death_by_surname_regiment".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            row_limit: default_row_limit(),
            query_timeout_secs: None,
            surnames: SurnameSettings::default(),
            views: ViewNames::default(),
        }
    }
}

impl Default for SurnameSettings {
    fn default() -> Self {
        Self {
            mode: SurnameMode::default(),
            limit: default_surname_limit(),
            order_column: default_surname_order_column(),
        }
    }
}

impl Default for ViewNames {
    fn default() -> Self {
        Self {
            map: default_map_view(),
            rank: default_rank_view(),
            timeline: default_timeline_view(),
            surnames: default_surname_view(),
        }
    }
}

impl Settings {
    /// Get the config directory path (~/.wardead/)
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".wardead"))
    }

    /// Parse settings from TOML text and validate them
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would produce meaningless queries
    pub fn validate(&self) -> ConfigResult<()> {
        if self.row_limit == 0 {
            return Err(ConfigError::Invalid("row_limit must be > 0".into()));
        }
        if self.surnames.mode == SurnameMode::Top {
            if self.surnames.limit == 0 {
                return Err(ConfigError::Invalid("surnames.limit must be > 0".into()));
            }
            if self.surnames.order_column.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "surnames.order_column must not be empty".into(),
                ));
            }
        }
        if self.query_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "query_timeout_secs must be > 0 (omit it to disable)".into(),
            ));
        }
        let views = [
            &self.views.map,
            &self.views.rank,
            &self.views.timeline,
            &self.views.surnames,
        ];
        if views.iter().any(|v| v.trim().is_empty()) {
            return Err(ConfigError::Invalid("view names must not be empty".into()));
        }
        Ok(())
    }
}

/// Load settings from an explicit file, or from ~/.wardead/config.toml.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load_settings(path: Option<&Path>) -> ConfigResult<Settings> {
    let path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ConfigError::NotFound(p.display().to_string()));
            }
            p.to_path_buf()
        }
        None => {
            let default = Settings::config_dir()?.join("config.toml");
            if !default.exists() {
                return Ok(Settings::default());
            }
            default
        }
    };
    let content = std::fs::read_to_string(&path)
        .map_err(|e| ConfigError::NotFound(format!("{}: {}", path.display(), e)))?;
    Settings::from_toml(&content)
}
