//! Application configuration for OptDesk.
//!
//! User config lives at `~/.optdesk/optdesk.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OptdeskError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "optdesk.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".optdesk";

// ---------------------------------------------------------------------------
// Config structs (matching optdesk.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Solver service settings.
    #[serde(default)]
    pub service: ServiceSection,

    /// Canned-answer playback settings.
    #[serde(default)]
    pub canned: CannedSection,
}

/// `[service]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// Base URL of the remote solver service.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[canned]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CannedSection {
    /// Pause between revealed stages during canned playback, in milliseconds.
    ///
    /// The staggered reveal is a deliberate pacing choice; it simulates
    /// the arrival rhythm of the remote service during demos.
    #[serde(default = "default_stage_delay_ms")]
    pub stage_delay_ms: u64,
}

impl Default for CannedSection {
    fn default() -> Self {
        Self {
            stage_delay_ms: default_stage_delay_ms(),
        }
    }
}

fn default_stage_delay_ms() -> u64 {
    3000
}

// ---------------------------------------------------------------------------
// Service config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime connection settings handed to the stage client at construction.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base URL of the remote solver service.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl From<&AppConfig> for ServiceConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_url: config.service.base_url.clone(),
            timeout: Duration::from_secs(config.service.timeout_secs),
        }
    }
}

impl AppConfig {
    /// Pause between revealed stages during canned playback.
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.canned.stage_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.optdesk/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OptdeskError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.optdesk/optdesk.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OptdeskError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OptdeskError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OptdeskError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OptdeskError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OptdeskError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the configured base URL is usable before opening a session.
pub fn validate_service(config: &AppConfig) -> Result<()> {
    let base = config.service.base_url.trim();
    if base.is_empty() {
        return Err(OptdeskError::config(
            "service base URL is empty — set [service] base_url in optdesk.toml",
        ));
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        return Err(OptdeskError::config(format!(
            "service base URL '{base}' must start with http:// or https://"
        )));
    }
    Ok(())
}
