//! Host configuration.
//!
//! Stored at `~/.config/shellcache/config.json`. Environment variables
//! (`SHELLCACHE_ORIGIN`, `SHELLCACHE_MANIFEST`, `SHELLCACHE_CACHE_DIR`)
//! override the file; command-line flags override both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::worker::DEFAULT_FILL_CONCURRENCY;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "shellcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const ENV_ORIGIN: &str = "SHELLCACHE_ORIGIN";
pub const ENV_MANIFEST: &str = "SHELLCACHE_MANIFEST";
pub const ENV_CACHE_DIR: &str = "SHELLCACHE_CACHE_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the application is served from, e.g. `https://app.example.com`.
    pub origin: Option<String>,
    /// Build manifest JSON produced by the build tooling.
    pub manifest_path: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    pub fill_concurrency: usize,
    /// Directory for daily rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            origin: None,
            manifest_path: None,
            cache_dir: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            fill_concurrency: DEFAULT_FILL_CONCURRENCY,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(origin) = get(ENV_ORIGIN) {
            self.origin = Some(origin);
        }
        if let Some(path) = get(ENV_MANIFEST) {
            self.manifest_path = Some(PathBuf::from(path));
        }
        if let Some(path) = get(ENV_CACHE_DIR) {
            self.cache_dir = Some(PathBuf::from(path));
        }
    }

    pub fn origin(&self) -> Result<&str> {
        self.origin
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No origin configured (set {} or pass --origin)", ENV_ORIGIN))
    }

    pub fn manifest_path(&self) -> Result<&Path> {
        self.manifest_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("No manifest configured (set {} or pass --manifest)", ENV_MANIFEST))
    }

    /// Cache root: the configured directory, or a per-origin directory under
    /// the platform cache dir.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }

        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref origin) = self.origin {
            path = path.join(Self::origin_dir_name(origin)?);
        }
        Ok(path)
    }

    fn origin_dir_name(origin: &str) -> Result<String> {
        let url = Url::parse(origin).with_context(|| format!("Invalid origin: {}", origin))?;
        let host = url
            .host_str()
            .ok_or_else(|| anyhow::anyhow!("Origin has no host: {}", origin))?;
        Ok(match url.port() {
            Some(port) => format!("{}_{}", host, port),
            None => host.to_string(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.fill_concurrency, DEFAULT_FILL_CONCURRENCY);
        assert!(config.origin.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"origin": "https://app.example.com", "fill_concurrency": 2}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.origin().unwrap(), "https://app.example.com");
        assert_eq!(config.fill_concurrency, 2);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            origin: Some("https://old.example.com".to_string()),
            ..Config::default()
        };
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_ORIGIN, "https://new.example.com"),
            (ENV_CACHE_DIR, "/tmp/shellcache"),
            (ENV_MANIFEST, "  "),
        ]);

        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.origin.as_deref(), Some("https://new.example.com"));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/shellcache")));
        assert!(config.manifest_path.is_none());
    }

    #[test]
    fn test_explicit_cache_dir_wins() {
        let config = Config {
            cache_dir: Some(PathBuf::from("/var/cache/app")),
            origin: Some("https://app.example.com".to_string()),
            ..Config::default()
        };
        assert_eq!(config.cache_dir().unwrap(), PathBuf::from("/var/cache/app"));
    }

    #[test]
    fn test_origin_dir_name_includes_port() {
        assert_eq!(Config::origin_dir_name("https://app.example.com").unwrap(), "app.example.com");
        assert_eq!(Config::origin_dir_name("http://localhost:8080").unwrap(), "localhost_8080");
        assert!(Config::origin_dir_name("not a url").is_err());
    }

    #[test]
    fn test_missing_origin_is_an_error() {
        let config = Config::default();
        assert!(config.origin().is_err());
        assert!(config.manifest_path().is_err());
    }
}
