//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FIELDWATCH_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "fieldwatch.db";

/// Default HTTP bind address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5740";

/// Default cap on incident videos per agent
pub const DEFAULT_MAX_VIDEOS_PER_AGENT: u32 = 3;

/// Contents of `config.toml`
///
/// Every field is optional in the file; missing values fall back to compiled defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<String>,
    pub bind_address: String,
    pub max_videos_per_agent: u32,
    pub vision: VisionConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            max_videos_per_agent: DEFAULT_MAX_VIDEOS_PER_AGENT,
            vision: VisionConfig::default(),
        }
    }
}

/// `[vision]` table: external form extraction service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Extraction endpoint URL. Uploads fail extraction when unset.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl TomlConfig {
    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config.toml: {}", e)))
    }

    /// Load config from an explicit file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load config from the platform config locations.
    ///
    /// A missing file is not an error: defaults are used and a warning is logged.
    /// A file that exists but does not parse is an error.
    pub fn load() -> Result<Self> {
        match find_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::load_from(&path)
            }
            None => {
                warn!("No config.toml found, using compiled defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Locate `config.toml`: user config dir first, then system-wide
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("fieldwatch").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/fieldwatch/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(
    cli_arg: Option<&str>,
    env_var_name: &str,
    toml: &TomlConfig,
) -> PathBuf {
    if let Some(path) = cli_arg.filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = toml.root_folder.as_deref().filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("fieldwatch"))
        .unwrap_or_else(|| PathBuf::from("./fieldwatch_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(root)?;
    Ok(root.join(DATABASE_FILE_NAME))
}
