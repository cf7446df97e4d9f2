//! Configuration management for the scrypt mining client
//!
//! Supports configuration via command line arguments, environment variables,
//! and configuration files (YAML/JSON). Values given on the command line or
//! through the environment take precedence over the file; the file takes
//! precedence over built-in defaults.

use crate::client::{BackoffConfig, RpcCredentials};
use crate::{Error, Result};
use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(level)
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact single-line output
    Plain,
    /// Multi-line human-friendly output
    Pretty,
    /// One JSON object per event
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogFormat::Plain => write!(f, "plain"),
            LogFormat::Pretty => write!(f, "pretty"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

/// Complete configuration for the mining client
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(
    name = "scrypt-mining-client",
    version = env!("CARGO_PKG_VERSION"),
    about = "Scrypt proof-of-work getwork mining client",
    long_about = "Fetches work over JSON-RPC getwork, searches for a nonce whose scrypt digest falls below the target, and submits the solved header"
)]
pub struct Config {
    /// Print the parsed configuration and exit
    #[arg(long)]
    #[serde(default)]
    pub print_config: bool,

    /// Configuration file path (YAML or JSON)
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub config_file: Option<PathBuf>,

    /// JSON-RPC endpoint of the mining server
    #[arg(short = 'u', long, env = "MINER_RPC_URL", default_value = "http://127.0.0.1:9332")]
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// RPC user for basic authentication
    #[arg(long, env = "MINER_RPC_USER")]
    #[serde(default)]
    pub rpc_user: Option<String>,

    /// RPC password for basic authentication
    #[arg(long, env = "MINER_RPC_PASSWORD", hide_env_values = true)]
    #[serde(default)]
    pub rpc_password: Option<String>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, default_value = "plain")]
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE")]
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// HTTP timeout in milliseconds
    #[arg(long, default_value = "30000")]
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Seconds to search one template before fetching fresh work
    #[arg(short = 'w', long, default_value = "60")]
    #[serde(default = "default_work_timeout")]
    pub work_timeout: u64,

    /// Maximum retry attempts for RPC requests
    #[arg(long, default_value = "10")]
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Base retry delay in milliseconds
    #[arg(long, default_value = "100")]
    #[serde(default = "default_retry_delay")]
    pub retry_delay: u64,

    /// Maximum retry delay in milliseconds
    #[arg(long, default_value = "5000")]
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay: u64,

    /// Hashes between search progress log lines (0 disables them)
    #[arg(long, default_value = "10000")]
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Mine a single solution, submit it and exit
    #[arg(long)]
    #[serde(default)]
    pub once: bool,
}

/// Copy file values into fields the user did not set explicitly
macro_rules! merge_unset {
    ($config:ident, $file:ident, $matches:ident, $($field:ident),+ $(,)?) => {
        $(
            if !explicitly_set($matches, stringify!($field)) {
                $config.$field = $file.$field;
            }
        )+
    };
}

fn explicitly_set(matches: &ArgMatches, id: &str) -> bool {
    matches!(
        matches.value_source(id),
        Some(ValueSource::CommandLine) | Some(ValueSource::EnvVariable)
    )
}

impl Config {
    /// Load configuration from the process arguments and optional file
    ///
    /// Exits the process on `--help`, `--version` or argument errors, like
    /// any clap program.
    pub async fn load() -> Result<Self> {
        let matches = Self::command().get_matches();
        Self::from_matches(&matches).await
    }

    /// Load configuration from an explicit argument list
    pub async fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::from_matches(&matches).await
    }

    async fn from_matches(matches: &ArgMatches) -> Result<Self> {
        let mut config =
            Self::from_arg_matches(matches).map_err(|e| Error::config(e.to_string()))?;

        if let Some(config_file) = &config.config_file {
            let file_config = Self::load_from_file(config_file).await?;
            config = config.merge_with_file(file_config, matches);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;

        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            serde_json::from_str(&content).map_err(Error::from)
        } else {
            // Default to YAML
            serde_yaml::from_str(&content).map_err(Error::from)
        }
    }

    /// Merge CLI config with file config (explicit CLI and env values win)
    fn merge_with_file(mut self, file: Self, matches: &ArgMatches) -> Self {
        merge_unset!(
            self,
            file,
            matches,
            rpc_url,
            rpc_user,
            rpc_password,
            log_level,
            log_format,
            log_file,
            http_timeout,
            work_timeout,
            max_retries,
            retry_delay,
            max_retry_delay,
            progress_interval,
            once,
        );
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.rpc_url)
            .map_err(|e| Error::config(format!("Invalid RPC URL: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "RPC URL must use http or https, got {}",
                url.scheme()
            )));
        }

        if self.rpc_password.is_some() && self.rpc_user.is_none() {
            return Err(Error::config("RPC password given without an RPC user"));
        }

        if self.http_timeout == 0 {
            return Err(Error::config("HTTP timeout must be greater than 0"));
        }

        if self.work_timeout == 0 {
            return Err(Error::config("Work timeout must be greater than 0"));
        }

        if self.retry_delay == 0 {
            return Err(Error::config("Retry delay must be greater than 0"));
        }

        if self.retry_delay > self.max_retry_delay {
            return Err(Error::config(
                "Retry delay must not exceed the maximum retry delay",
            ));
        }

        Ok(())
    }

    /// Basic-auth credentials, if an RPC user is configured
    pub fn credentials(&self) -> Option<RpcCredentials> {
        self.rpc_user.as_ref().map(|user| {
            RpcCredentials::new(user.clone(), self.rpc_password.clone().unwrap_or_default())
        })
    }

    /// Retry policy for RPC requests
    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.retry_delay_duration(),
            max_delay: self.max_retry_delay_duration(),
            max_retries: self.max_retries,
            ..BackoffConfig::default()
        }
    }

    /// Copy of the configuration that is safe to print
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.rpc_password.is_some() {
            config.rpc_password = Some("<redacted>".to_string());
        }
        config
    }

    /// Get HTTP timeout duration
    pub fn http_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.http_timeout)
    }

    /// Get work refresh timeout duration
    pub fn work_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.work_timeout)
    }

    /// Get retry delay duration
    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    /// Get max retry delay duration
    pub fn max_retry_delay_duration(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay)
    }
}

// Default value functions for serde
fn default_rpc_url() -> String { "http://127.0.0.1:9332".to_string() }
fn default_log_level() -> LogLevel { LogLevel::Info }
fn default_log_format() -> LogFormat { LogFormat::Plain }
fn default_http_timeout() -> u64 { 30000 }
fn default_work_timeout() -> u64 { 60 }
fn default_max_retries() -> usize { 10 }
fn default_retry_delay() -> u64 { 100 }
fn default_max_retry_delay() -> u64 { 5000 }
fn default_progress_interval() -> u64 { 10_000 }
