//! Store configuration via `docstore.toml`
//!
//! On first open of a durable store, a default `docstore.toml` is written to
//! the data directory. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use docstore_core::{Error, Result, DEFAULT_MAX_PATCHES};
use docstore_storage::SyncMode;

/// Config file name placed in the store data directory.
pub const CONFIG_FILE_NAME: &str = "docstore.toml";

/// Default long-poll budget in milliseconds
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 50_000;

/// Store configuration loaded from `docstore.toml`.
///
/// # Example
///
/// ```toml
/// durability = "always"
/// max_patches = 20
/// poll_timeout_ms = 50000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Durability mode: `"always"` or `"standard"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Patches retained per key, new patch included.
    #[serde(default = "default_max_patches")]
    pub max_patches: usize,
    /// Poll budget used when the caller does not pass one.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

fn default_durability_str() -> String {
    "always".to_string()
}

fn default_max_patches() -> usize {
    DEFAULT_MAX_PATCHES
}

fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            max_patches: default_max_patches(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl StoreConfig {
    /// Parse the durability string into a `SyncMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"always"` or `"standard"`.
    pub fn sync_mode(&self) -> Result<SyncMode> {
        match self.durability.as_str() {
            "always" => Ok(SyncMode::Always),
            "standard" => Ok(SyncMode::Standard),
            other => Err(Error::Config(format!(
                "Invalid durability mode '{}' in {}. Expected \"always\" or \"standard\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Default poll budget as a `Duration`
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.sync_mode()?;
        if self.max_patches == 0 {
            return Err(Error::Config(format!(
                "max_patches must be at least 1 in {}",
                CONFIG_FILE_NAME
            )));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Document store configuration
#
# Durability mode: "always" (default) or "standard"
#   "always"   = fsync every write, zero data loss
#   "standard" = flush to the OS every write, survives process crash only
durability = "always"

# Patches kept per document for change-feed catch-up (default: 20)
max_patches = 20

# Long-poll budget in milliseconds when the caller passes none (default: 50000)
poll_timeout_ms = 50000
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                Error::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_always() {
        let config = StoreConfig::default();
        assert_eq!(config.durability, "always");
        assert_eq!(config.sync_mode().unwrap(), SyncMode::Always);
        assert_eq!(config.max_patches, 20);
        assert_eq!(config.poll_timeout(), Duration::from_secs(50));
    }

    #[test]
    fn parse_standard() {
        let config: StoreConfig = toml::from_str("durability = \"standard\"").unwrap();
        assert_eq!(config.sync_mode().unwrap(), SyncMode::Standard);
    }

    #[test]
    fn parse_invalid_mode_returns_error() {
        let config: StoreConfig = toml::from_str("durability = \"turbo\"").unwrap();
        assert!(matches!(config.sync_mode(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_max_patches_is_rejected() {
        let config: StoreConfig = toml::from_str("max_patches = 0").unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: StoreConfig = toml::from_str(StoreConfig::default_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        StoreConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        std::fs::write(&path, "max_patches = 5\n").unwrap();
        StoreConfig::write_default_if_missing(&path).unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config.max_patches, 5);
        assert_eq!(config.durability, "always");
    }

    #[test]
    fn from_file_with_missing_field_uses_default() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "").unwrap();

        let config = StoreConfig::from_file(&path).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn from_file_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "max_patches = \"lots\"").unwrap();
        assert!(matches!(StoreConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = StoreConfig {
            durability: "standard".to_string(),
            max_patches: 3,
            poll_timeout_ms: 250,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }
}
