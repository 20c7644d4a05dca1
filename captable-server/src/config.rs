//! Configuration for captable-server

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CapTableError;
use crate::services::ServiceSettings;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("captable-server")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the database and document blobs
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Address the HTTP API binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Externally reachable base URL used in signed download links
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Secret for signed download URLs. Generated on first start when unset.
    #[serde(default)]
    pub signing_secret: Option<String>,

    /// Lifetime of signed download URLs
    #[serde(default = "default_signed_url_ttl_secs")]
    pub signed_url_ttl_secs: u64,

    /// Largest accepted document
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Run the signed PDF repair sweep on startup
    #[serde(default)]
    pub repair_on_start: bool,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8088
}

fn default_public_base_url() -> String {
    format!("http://localhost:{}", default_http_port())
}

fn default_signed_url_ttl_secs() -> u64 {
    3600
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            public_base_url: default_public_base_url(),
            signing_secret: None,
            signed_url_ttl_secs: default_signed_url_ttl_secs(),
            max_upload_bytes: default_max_upload_bytes(),
            repair_on_start: false,
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CapTableError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CapTableError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CapTableError> {
        let content = toml::to_string_pretty(self).map_err(|e| CapTableError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get documents directory
    pub fn documents_dir(&self) -> PathBuf {
        self.storage_dir.join("documents")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    pub fn service_settings(&self) -> ServiceSettings {
        let ttl_secs = i64::try_from(self.signed_url_ttl_secs).unwrap_or(i64::MAX / 1000);
        ServiceSettings {
            max_upload_bytes: self.max_upload_bytes,
            signed_url_ttl: chrono::Duration::seconds(ttl_secs.clamp(1, 7 * 24 * 3600)),
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), CapTableError> {
        if self.max_upload_bytes == 0 {
            return Err(CapTableError::Config("max_upload_bytes must be positive".into()));
        }
        if self.signed_url_ttl_secs == 0 {
            return Err(CapTableError::Config("signed_url_ttl_secs must be positive".into()));
        }
        if let Some(secret) = &self.signing_secret {
            if secret.len() < 16 {
                return Err(CapTableError::Config("signing_secret must be at least 16 bytes".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("http_port = 9000\n").unwrap();
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.signed_url_ttl_secs, 3600);
        assert!(config.signing_secret.is_none());
    }

    #[test]
    fn test_save_load() {
        let dir = TempDir::new().unwrap();
        let mut config = Config {
            storage_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        config.signing_secret = Some("0123456789abcdef0123".into());
        config.save(config.config_path()).unwrap();

        let loaded = Config::load(config.config_path()).unwrap();
        assert_eq!(loaded.signing_secret, config.signing_secret);
        assert_eq!(loaded.documents_dir(), dir.path().join("documents"));
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let short = Config {
            signing_secret: Some("short".into()),
            ..Config::default()
        };
        assert!(short.validate().is_err());
    }
}
