//! Configuration management for Avalab

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result, StoreError};

/// Production API host
pub const DEFAULT_API_HOST: &str = "https://api.avalab.ai";

/// Web application host (authorization page, generation page)
pub const DEFAULT_APP_HOST: &str = "https://avalab.ai";

/// OAuth client ID registered for this tool
pub const DEFAULT_CLIENT_ID: &str = "OpffO-hqQJWkLQHl_dwkNA";

/// Fixed loopback port the authorization server redirects to
pub const DEFAULT_REDIRECT_PORT: u16 = 4444;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Avalab API base URL
    #[serde(default = "default_api_host")]
    pub api_host: String,

    /// Avalab web application base URL
    #[serde(default = "default_app_host")]
    pub app_host: String,

    /// OAuth client ID
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// API key sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Loopback port for the OAuth redirect
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,

    /// HTML page served after the redirect (embedded page when unset or unreadable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_page: Option<PathBuf>,

    /// Encrypt stored tokens at rest
    #[serde(default = "default_seal_tokens")]
    pub seal_tokens: bool,

    /// User preferences
    #[serde(default)]
    pub preferences: Preferences,
}

/// User preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// Default output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

fn default_api_host() -> String {
    DEFAULT_API_HOST.to_string()
}

fn default_app_host() -> String {
    DEFAULT_APP_HOST.to_string()
}

fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.to_string()
}

fn default_redirect_port() -> u16 {
    DEFAULT_REDIRECT_PORT
}

fn default_seal_tokens() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: default_api_host(),
            app_host: default_app_host(),
            client_id: default_client_id(),
            api_key: None,
            redirect_port: default_redirect_port(),
            redirect_page: None,
            seal_tokens: default_seal_tokens(),
            preferences: Preferences::default(),
        }
    }
}

impl Config {
    /// Get the default data directory (~/.avalab)
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(StoreError::NoHome)?;
        Ok(home.join(".avalab"))
    }

    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        Ok(Self::default_dir()?.join("config.yaml"))
    }

    /// Resolve an optional override to a concrete config path
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        let path = Self::resolve_path(path)?;
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // Set file permissions to 600 on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Validate field values that serde cannot check
    pub fn validate(&self) -> Result<()> {
        for (name, host) in [("api_host", &self.api_host), ("app_host", &self.app_host)] {
            url::Url::parse(host)
                .map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", name, host, e)))?;
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::Invalid("client_id must not be empty".to_string()).into());
        }
        Ok(())
    }

    /// API key, or an error telling the user how to set one
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey.into())
    }

    /// Redirect URI registered with the authorization server
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/", self.redirect_port)
    }

    /// Read the custom redirect page, if one is configured and readable
    pub fn redirect_page_html(&self) -> Option<String> {
        let path = self.redirect_page.as_ref()?;
        match std::fs::read_to_string(path) {
            Ok(html) => Some(html),
            Err(e) => {
                log::warn!(
                    "Could not read redirect page {}: {}; using built-in page",
                    path.display(),
                    e
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_host, DEFAULT_API_HOST);
        assert_eq!(config.redirect_port, 4444);
        assert!(config.api_key.is_none());
        assert!(config.seal_tokens);
        assert_eq!(config.redirect_uri(), "http://localhost:4444/");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = Config::load_at(path.to_str()).unwrap();
        assert_eq!(config.client_id, DEFAULT_CLIENT_ID);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api_key: key-123\nredirect_port: 5555\n").unwrap();

        let config = Config::load_at(path.to_str()).unwrap();
        assert_eq!(config.require_api_key().unwrap(), "key-123");
        assert_eq!(config.redirect_port, 5555);
        assert_eq!(config.app_host, DEFAULT_APP_HOST);
    }

    #[test]
    fn test_invalid_host_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "api_host: not a url\n").unwrap();

        assert!(Config::load_at(path.to_str()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let config = Config {
            api_key: Some("saved-key".to_string()),
            seal_tokens: false,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_key.as_deref(), Some("saved-key"));
        assert!(!loaded.seal_tokens);
    }

    #[test]
    fn test_missing_api_key() {
        let config = Config {
            api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_unreadable_redirect_page_falls_back() {
        let config = Config {
            redirect_page: Some(PathBuf::from("/definitely/not/here.html")),
            ..Config::default()
        };
        assert!(config.redirect_page_html().is_none());
    }
}
