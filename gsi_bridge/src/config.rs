use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::reconnect::BackoffPolicy;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 4000;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 5;
const DEFAULT_SILENCE_THRESHOLD_SECONDS: u64 = 30;
const DEFAULT_MAX_BACKOFF_SECONDS: u64 = 1024;

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[clap(about = "Dota 2 Game State Integration bridge", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "GSI_HOST", help = "Address to bind the GSI listener on.")]
    pub host: Option<String>,

    #[clap(long, env = "GSI_PORT", help = "Port the game client pushes updates to.")]
    pub port: Option<u16>,

    #[clap(long, env = "GSI_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "GSI_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "GSI_LOG_LEVEL", help = "Logging level (debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "GSI_CHECK_INTERVAL_SECONDS", help = "Interval in seconds between feed liveness checks.")]
    pub check_interval_seconds: Option<u64>,

    #[clap(long, env = "GSI_SILENCE_THRESHOLD_SECONDS", help = "Seconds without an update before the listener is restarted.")]
    pub silence_threshold_seconds: Option<u64>,

    #[clap(long, env = "GSI_MAX_RECONNECT_ATTEMPTS", help = "Restart attempts before giving up; 0 retries forever.")]
    pub max_reconnect_attempts: Option<u32>,

    #[clap(long, env = "GSI_MAX_BACKOFF_SECONDS", help = "Upper bound in seconds for a single backoff delay.")]
    pub max_backoff_seconds: Option<u64>,
}

impl Config {
    // Merge two Configs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            check_interval_seconds: other.check_interval_seconds.or(self.check_interval_seconds),
            silence_threshold_seconds: other
                .silence_threshold_seconds
                .or(self.silence_threshold_seconds),
            max_reconnect_attempts: other.max_reconnect_attempts.or(self.max_reconnect_attempts),
            max_backoff_seconds: other.max_backoff_seconds.or(self.max_backoff_seconds),
        }
    }

    pub fn host(&self) -> String {
        self.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }

    pub fn check_interval_seconds(&self) -> u64 {
        self.check_interval_seconds
            .unwrap_or(DEFAULT_CHECK_INTERVAL_SECONDS)
    }

    pub fn silence_threshold_seconds(&self) -> u64 {
        self.silence_threshold_seconds
            .unwrap_or(DEFAULT_SILENCE_THRESHOLD_SECONDS)
    }

    /// Which backoff policy the reconnect controller runs under. Zero (the
    /// default) means retry forever.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        let max_delay_secs = self.max_backoff_seconds.unwrap_or(DEFAULT_MAX_BACKOFF_SECONDS);
        match self.max_reconnect_attempts.unwrap_or(0) {
            0 => BackoffPolicy::Unbounded { max_delay_secs },
            max_attempts => BackoffPolicy::Bounded {
                max_attempts,
                max_delay_secs,
            },
        }
    }
}

/// Loads configuration: defaults, overridden by the JSON config file (if
/// present), overridden by environment variables and CLI arguments.
pub fn load_config() -> Config {
    // CLI parsed early only to honor a --config-path override
    let cli_args_for_path = Config::parse();

    let config_file_path = cli_args_for_path
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_gsi.conf"));

    let mut current_config = Config::default();

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => {
                    current_config = current_config.merge(file_config);
                }
                Err(e) => {
                    log::warn!(
                        "Failed to parse config file {}: {}. Falling back to other sources.",
                        config_file_path.display(),
                        e
                    );
                }
            },
            Err(e) => {
                log::warn!(
                    "Failed to read config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                );
            }
        }
    } else {
        log::info!(
            "Config file not found at {}. Using defaults and environment/CLI variables.",
            config_file_path.display()
        );
    }

    // environment variables and CLI arguments win
    current_config.merge(cli_args_for_path)
}
