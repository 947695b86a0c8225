//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{WrapErr, eyre};
use serde::{Deserialize, Serialize};

use deployctl_core::{COMMS_VERSION_KEY, EnsureConfig, WaitConfig};

/// Environment variable pointing at a config file
pub const CONFIG_ENV: &str = "DEPLOYCTL_CONFIG";
/// Environment variable holding a bearer token
pub const TOKEN_ENV: &str = "DEPLOYCTL_TOKEN";

/// Top-level configuration for deployctl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Management server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Deployment tracking settings
    #[serde(default)]
    pub deploy: DeployConfig,
}

/// Management server settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the management API
    pub url: Option<String>,
    /// Skip TLS certificate verification
    #[serde(default)]
    pub skip_verify: bool,
    /// File holding the bearer token
    pub token_file: Option<PathBuf>,
}

/// Deployment tracking settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Status checks before giving up (0 = don't wait)
    #[serde(default = "default_wait_attempts")]
    pub wait_attempts: u32,
    /// Seconds between two status checks
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Artifact provide key and device attribute holding the version
    #[serde(default = "default_version_key")]
    pub version_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            deploy: DeployConfig::default(),
        }
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            wait_attempts: default_wait_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
            version_key: default_version_key(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_wait_attempts() -> u32 {
    32
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_version_key() -> String {
    COMMS_VERSION_KEY.to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .wrap_err_with(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Load from default paths or use defaults
    pub fn load_default() -> eyre::Result<Self> {
        // Check environment variable
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(&PathBuf::from(path));
        }

        // Try common paths
        let paths = [
            Some(PathBuf::from("deployctl.toml")),
            dirs::config_dir().map(|p| p.join("deployctl/deployctl.toml")),
        ];

        for path in paths.into_iter().flatten() {
            if path.exists() {
                return Self::load(&path);
            }
        }

        Ok(Config::default())
    }

    /// Server URL from the flag or the config file
    ///
    /// # Errors
    /// Returns error when neither provides one
    pub fn server_url(&self, flag: Option<&str>) -> eyre::Result<String> {
        flag.map(str::to_string)
            .or_else(|| self.server.url.clone())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| eyre!("no server specified, pass --server or set server.url"))
    }

    /// Bearer token from the flag, `DEPLOYCTL_TOKEN`, or the token file
    ///
    /// # Errors
    /// Returns error when no source yields a token
    pub fn token(&self, flag: Option<&str>) -> eyre::Result<String> {
        let env = std::env::var(TOKEN_ENV).ok();
        let file = self
            .server
            .token_file
            .as_deref()
            .map(expand_home)
            .or_else(default_token_file);
        resolve_token(flag, env.as_deref(), file.as_deref())
    }

    /// Wait settings, with an optional attempt override
    pub fn wait(&self, attempts: Option<u32>) -> WaitConfig {
        WaitConfig::new(
            attempts.unwrap_or(self.deploy.wait_attempts),
            Duration::from_secs(self.deploy.poll_interval_secs),
        )
    }

    pub fn ensure(&self, attempts: Option<u32>) -> EnsureConfig {
        EnsureConfig {
            version_key: self.deploy.version_key.clone(),
            wait: self.wait(attempts),
            ..EnsureConfig::default()
        }
    }
}

/// Replace a leading `~` with the home directory
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

fn default_token_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("deployctl/authtoken"))
}

fn resolve_token(
    flag: Option<&str>,
    env: Option<&str>,
    file: Option<&Path>,
) -> eyre::Result<String> {
    if let Some(token) = flag.or(env).map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    let Some(path) = file else {
        return Err(eyre!("no auth token, pass --token or set {TOKEN_ENV}"));
    };
    let token = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("no auth token, failed to read {}", path.display()))?;
    let token = token.trim();
    if token.is_empty() {
        return Err(eyre!("token file {} is empty", path.display()));
    }
    Ok(token.to_string())
}
