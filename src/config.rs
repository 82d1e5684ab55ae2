//! Configuration file handling for shell sessions.
//!
//! This module provides loading and parsing of `.sqlite_shell.json` configuration files.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::ClientOptions;

/// Default configuration file name, looked up in the current directory.
pub const CONFIG_FILE_NAME: &str = ".sqlite_shell.json";

/// Top-level configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Shell launch configuration
    #[serde(default)]
    pub shell: ShellConfigFile,
}

/// Shell settings; anything left out falls back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfigFile {
    /// Path to the sqlite3 binary
    pub bin: Option<PathBuf>,
    /// Path to the database
    pub path: Option<String>,
}

impl ConfigFile {
    /// Load configuration from `.sqlite_shell.json` in the current directory.
    ///
    /// A missing default file yields the default configuration.
    pub fn load_default() -> Result<Self, Box<dyn Error>> {
        let config_path = PathBuf::from(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load(&config_path)
    }

    /// Load configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file doesn't exist or cannot be read
    /// - The JSON is invalid
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path).map_err(|e| {
            Box::new(std::io::Error::new(
                e.kind(),
                format!("Failed to read {}: {}", path.display(), e),
            )) as Box<dyn Error>
        })?;

        Self::parse(&content).map_err(|e| {
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Invalid JSON in {}: {}", path.display(), e),
            )) as Box<dyn Error>
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

impl ShellConfigFile {
    /// Resolve into client options, with explicit overrides taking precedence.
    pub fn to_client_options(&self, bin: Option<PathBuf>, path: Option<String>) -> ClientOptions {
        let defaults = ClientOptions::default();
        ClientOptions {
            bin: bin.or_else(|| self.bin.clone()).unwrap_or(defaults.bin),
            path: path.or_else(|| self.path.clone()).unwrap_or(defaults.path),
        }
    }
}
