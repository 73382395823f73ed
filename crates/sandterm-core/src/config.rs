//! Configuration management for sandterm.
//!
//! Loads configuration from ${SANDTERM_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured server URL.
pub const SERVER_URL_ENV: &str = "SANDTERM_URL";

/// Returns the default config template with comments.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for sandterm configuration and data files.
    //!
    //! SANDTERM_HOME resolution order:
    //! 1. SANDTERM_HOME environment variable (if set)
    //! 2. ~/.config/sandterm (default)
    //! 3. ./.sandterm when no home directory can be determined

    use std::path::PathBuf;

    /// Returns the sandterm home directory.
    pub fn sandterm_home() -> PathBuf {
        if let Ok(home) = std::env::var("SANDTERM_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".sandterm"),
            |h| h.join(".config").join("sandterm"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        sandterm_home().join("config.toml")
    }

    /// Returns the path of the persisted session id.
    pub fn session_path() -> PathBuf {
        sandterm_home().join("session")
    }

    /// Returns the log directory.
    pub fn logs_dir() -> PathBuf {
        sandterm_home().join("logs")
    }
}

/// Keep-alive configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmupConfig {
    /// Whether to ping `/api/health` in the background.
    pub enabled: bool,
    /// Seconds between recurring pings.
    pub interval_secs: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 4 * 60,
        }
    }
}

impl WarmupConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the sandbox front server (`/api/*` lives below it).
    pub server_url: String,

    /// Prompt printed before each line read.
    pub prompt: String,

    /// First tokens that run through the streaming executor.
    pub streaming_commands: Vec<String>,

    /// First tokens that open an interactive socket session.
    pub interactive_commands: Vec<String>,

    /// Timeout for exec/reset requests in seconds (0 disables).
    pub request_timeout_secs: u64,

    /// Delay between socket open and sending the queued command line.
    pub interactive_init_delay_ms: u64,

    /// Fallback terminal width when the real size is unknown.
    pub default_cols: u16,

    /// Fallback terminal height when the real size is unknown.
    pub default_rows: u16,

    /// Keep-alive configuration.
    #[serde(default)]
    pub warmup: WarmupConfig,
}

impl Config {
    const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8787";
    const DEFAULT_PROMPT: &str = "\u{1b}[32m$\u{1b}[0m ";
    const DEFAULT_INIT_DELAY_MS: u64 = 100;

    /// Loads configuration from the default config path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Creates a default config file at the given path.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.request_timeout_secs))
        }
    }

    pub fn interactive_init_delay(&self) -> Duration {
        Duration::from_millis(self.interactive_init_delay_ms)
    }

    /// Resolves the server URL with precedence: flag > env > config.
    ///
    /// # Errors
    /// Returns an error if the winning candidate is not a valid URL.
    pub fn resolve_server_url(&self, flag: Option<&str>, env: Option<&str>) -> Result<url::Url> {
        let candidate = [flag, env]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
            .unwrap_or(self.server_url.trim());

        url::Url::parse(candidate).with_context(|| format!("Invalid server URL: {candidate}"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: Self::DEFAULT_SERVER_URL.to_string(),
            prompt: Self::DEFAULT_PROMPT.to_string(),
            streaming_commands: vec!["anvil".to_string()],
            interactive_commands: vec!["chisel".to_string(), "node".to_string()],
            request_timeout_secs: 0,
            interactive_init_delay_ms: Self::DEFAULT_INIT_DELAY_MS,
            default_cols: 120,
            default_rows: 32,
            warmup: WarmupConfig::default(),
        }
    }
}
