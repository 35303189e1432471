//! Configuration file for `~/.gatorconfig.json`.
//!
//! The file holds the storage connection string and the name of the user who
//! last logged in. It is read once at startup and written back only when that
//! user changes (`login`, `register`).
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name inside the user's home directory
pub const CONFIG_FILE_NAME: &str = ".gatorconfig.json";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found at {0}; create it with a \"db_url\" entry")]
    NotFound(PathBuf),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON in config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("HOME environment variable not set")]
    NoHome,
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Process-wide configuration.
///
/// `db_url` is wrapped in [`SecretString`] so it never shows up in `Debug`
/// output or logs.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// SQLite connection string or database path
    pub db_url: SecretString,

    /// User the logged-in-only commands act as
    #[serde(default)]
    pub current_user_name: Option<String>,

    #[serde(skip)]
    path: PathBuf,
}

/// On-disk shape used when writing; borrows so the secret is exposed only here.
#[derive(Serialize)]
struct ConfigFile<'a> {
    db_url: &'a str,
    current_user_name: Option<&'a str>,
}

/// `$HOME/.gatorconfig.json`
pub fn default_path() -> Result<PathBuf, ConfigError> {
    let home = std::env::var_os("HOME").ok_or(ConfigError::NoHome)?;
    Ok(PathBuf::from(home).join(CONFIG_FILE_NAME))
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a JSON file.
    ///
    /// - Missing file → `Err(ConfigError::NotFound)`
    /// - Invalid JSON or missing `db_url` → `Err(ConfigError::Parse)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        config.path = path.to_path_buf();

        tracing::debug!(
            path = %path.display(),
            user = config.current_user_name.as_deref().unwrap_or("<none>"),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Path this config was loaded from and will be saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `name` as the current user and persist the file.
    pub fn set_user(&mut self, name: &str) -> Result<(), ConfigError> {
        self.current_user_name = Some(name.to_string());
        self.save()
    }

    /// Write the config back atomically (temp file, fsync, rename).
    fn save(&self) -> Result<(), ConfigError> {
        let file = ConfigFile {
            db_url: self.db_url.expose_secret(),
            current_user_name: self.current_user_name.as_deref(),
        };
        let data = serde_json::to_vec_pretty(&file)?;

        let temp_path = self.path.with_extension(format!("tmp.{}", std::process::id()));
        let write_temp = || -> std::io::Result<()> {
            let mut temp_file = std::fs::File::create(&temp_path)?;
            temp_file.write_all(&data)?;
            temp_file.sync_all()?;
            Ok(())
        };
        if let Err(e) = write_temp().and_then(|_| std::fs::rename(&temp_path, &self.path)) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(ConfigError::Io(e));
        }

        tracing::debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
