use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::history::DEFAULT_PAGE_SIZE;
use crate::slack::DEFAULT_API_URL;

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/env/config file).
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub target_dir: PathBuf,
    pub api_url: Url,
    pub page_size: u32,
    pub dry_run: bool,
    pub skip_channels: bool,
    pub skip_private_channels: bool,
    pub skip_direct_messages: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            target_dir: PathBuf::from("."),
            api_url: default_api_url(),
            page_size: DEFAULT_PAGE_SIZE,
            dry_run: false,
            skip_channels: false,
            skip_private_channels: false,
            skip_direct_messages: false,
        }
    }
}

/// Largest `count` the history methods accept.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Reject page sizes the history methods would not honour.
pub fn check_page_size(page_size: u32) -> Result<u32> {
    if (1..=MAX_PAGE_SIZE).contains(&page_size) {
        Ok(page_size)
    } else {
        Err(eyre!(
            "page_size must be between 1 and {} (got {})",
            MAX_PAGE_SIZE,
            page_size
        ))
    }
}

pub fn default_api_url() -> Url {
    Url::parse(DEFAULT_API_URL).expect("default API URL is valid")
}

/// Optional persisted preferences, `config.toml`.
#[derive(Debug, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub token: Option<String>,
    pub target_dir: Option<PathBuf>,
    pub api_url: Option<Url>,
    pub page_size: Option<u32>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("slack-history-export/config.toml"))
}

/// Load the config file: an explicit path must exist, the default path is optional.
pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        default_config_path().filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}
