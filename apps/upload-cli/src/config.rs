//! Uploader configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/kmcp/upload.toml`
//! - Windows: `%APPDATA%/kmcp/upload.toml`

use std::path::{Path, PathBuf};

use anyhow::Context;
use kmcp_uploader::UploadSettings;
use serde::{Deserialize, Serialize};

/// Environment variable consulted for the session key.
pub const KS_ENV: &str = "KMCP_KS";

/// Uploader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the media platform.
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Session key. `KMCP_KS` takes precedence when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ks: Option<String>,

    /// Chunking, retry and finalization tunables.
    #[serde(default)]
    pub upload: UploadSettings,
}

fn default_service_url() -> String {
    "https://www.kaltura.com".into()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            ks: None,
            upload: UploadSettings::default(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing default file is created with
    /// default values.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        let path = config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            let config = Config::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Saves the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        // The file may hold a session key.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Picks the session key: `env_ks` first, then the file's `ks`.
    pub fn session_key(&self, env_ks: Option<String>) -> Option<String> {
        env_ks
            .into_iter()
            .chain(self.ks.clone())
            .map(|k| k.trim().to_string())
            .find(|k| !k.is_empty())
    }
}

/// Returns the platform-specific configuration file path.
fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA").context("APPDATA is not set")?;
        Ok(PathBuf::from(appdata).join("kmcp").join("upload.toml"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("kmcp")
            .join("upload.toml"))
    }
}
