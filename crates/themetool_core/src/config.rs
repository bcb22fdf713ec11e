use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OFFICIAL_JSON: &str = "community-css-themes.json";
pub const DEFAULT_ADDON_JSON: &str = "community-css-themes-tag-browser.json";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_TAG_MACROS_JSON: &str = "tag_macros.json";
pub const DEFAULT_USER_AGENT: &str = "themetool/0.3";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ThemetoolConfig {
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub tags: TagsSection,
    #[serde(default)]
    pub validation: ValidationSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct PathsSection {
    pub official: Option<PathBuf>,
    pub addon: Option<PathBuf>,
    pub backup_dir: Option<PathBuf>,
    pub tag_macros: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct TagsSection {
    pub add_minimalistic: Option<bool>,
    pub min_tags: Option<usize>,
    pub max_tags: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct ValidationSection {
    pub url_timeout_ms: Option<u64>,
    pub github_timeout_ms: Option<u64>,
    pub concurrency: Option<usize>,
    pub max_side_screenshots: Option<usize>,
}

impl ThemetoolConfig {
    /// Resolve the official list path: env THEMETOOL_OFFICIAL_JSON > config > default.
    pub fn official_path(&self) -> PathBuf {
        env_path("THEMETOOL_OFFICIAL_JSON")
            .or_else(|| self.paths.official.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OFFICIAL_JSON))
    }

    /// Resolve the addon list path: env THEMETOOL_ADDON_JSON > config > default.
    pub fn addon_path(&self) -> PathBuf {
        env_path("THEMETOOL_ADDON_JSON")
            .or_else(|| self.paths.addon.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ADDON_JSON))
    }

    pub fn backup_dir(&self) -> PathBuf {
        env_path("THEMETOOL_BACKUP_DIR")
            .or_else(|| self.paths.backup_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR))
    }

    pub fn tag_macros_path(&self) -> PathBuf {
        env_path("THEMETOOL_TAG_MACROS")
            .or_else(|| self.paths.tag_macros.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TAG_MACROS_JSON))
    }

    pub fn add_minimalistic(&self) -> bool {
        self.tags.add_minimalistic.unwrap_or(true)
    }

    pub fn min_tags(&self) -> usize {
        self.tags.min_tags.unwrap_or(1)
    }

    pub fn max_tags(&self) -> usize {
        self.tags.max_tags.unwrap_or(10)
    }

    pub fn url_timeout_ms(&self) -> u64 {
        env_value_u64("THEMETOOL_URL_TIMEOUT_MS")
            .or(self.validation.url_timeout_ms)
            .unwrap_or(10_000)
    }

    pub fn github_timeout_ms(&self) -> u64 {
        env_value_u64("THEMETOOL_GITHUB_TIMEOUT_MS")
            .or(self.validation.github_timeout_ms)
            .unwrap_or(15_000)
    }

    pub fn concurrency(&self) -> usize {
        self.validation.concurrency.unwrap_or(5).max(1)
    }

    pub fn max_side_screenshots(&self) -> usize {
        self.validation.max_side_screenshots.unwrap_or(10)
    }
}

/// Load and parse a ThemetoolConfig from a TOML file. Returns default if
/// the file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ThemetoolConfig> {
    if !config_path.exists() {
        return Ok(ThemetoolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ThemetoolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

fn env_path(key: &str) -> Option<PathBuf> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
        _ => None,
    }
}

fn env_value_u64(key: &str) -> Option<u64> {
    env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
