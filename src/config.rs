//! Gateway configuration.
//!
//! Loaded from a TOML file (`--config`, `$SMSGW_CONFIG_PATH`, or
//! `/etc/smsgw/config.toml`), then overridden by environment variables.
//! A missing file means defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::delivery::{DirectPolicy, RetryPolicy, TelegramConfig};

/// Config file used when neither `--config` nor `$SMSGW_CONFIG_PATH` is set.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/smsgw/config.toml";

/// Spool directory of the modem daemon when `$GAMMU_SPOOL_PATH` is unset.
pub const DEFAULT_SPOOL_PATH: &str = "/var/spool/gammu";

/// Configuration errors. All are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting is absent or empty. Holds the env var name.
    #[error("{0} is not set")]
    Missing(&'static str),
    /// The config file exists but cannot be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Top-level config ────────────────────────────────────────────

/// Top-level gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Queue location and worker pacing.
    pub queue: QueueConfig,
    /// Bot API credentials and endpoint.
    pub telegram: TelegramSection,
    /// How `receive` hands messages off.
    pub delivery: DeliveryConfig,
    /// Log level and optional JSON log directory.
    pub logging: LoggingConfig,
    /// Diagnostics gathered while loading, emitted by [`Self::log_notices`]
    /// once a subscriber is installed.
    #[serde(skip)]
    pub notices: Vec<ConfigNotice>,
}

/// Something worth logging that happened while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigNotice {
    /// Values were read from this file.
    LoadedFile(PathBuf),
    /// No file at this path; defaults apply.
    NoFile(PathBuf),
    /// An env override could not be parsed and was ignored.
    InvalidOverride {
        /// Env var name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

impl GatewayConfig {
    /// Load with precedence env > file > defaults.
    ///
    /// `path` is the `--config` flag, if given.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env = |key: &str| std::env::var(key).ok();
        let path = Self::config_path_with(path, env);
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Load from a TOML file only. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read or parse failure.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let mut config = Self::from_toml(&contents)?;
                config.notices.push(ConfigNotice::LoadedFile(path.to_path_buf()));
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut config = Self::default();
                config.notices.push(ConfigNotice::NoFile(path.to_path_buf()));
                Ok(config)
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Resolve the config file path using a custom env resolver.
    pub fn config_path_with(cli: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = cli {
            return p.to_path_buf();
        }
        if let Some(p) = env("SMSGW_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_PATH)
    }

    /// Apply environment variable overrides.
    ///
    /// Takes a resolver function so tests never touch the process env.
    /// Unparseable values are ignored and recorded as
    /// [`ConfigNotice::InvalidOverride`]. A non-positive `QUEUE_MAX_RETRIES`
    /// means a single attempt.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        // Queue.
        if let Some(v) = env("SMSGW_QUEUE_DIR") {
            self.queue.dir = Some(PathBuf::from(v));
        } else if self.queue.dir.is_none() {
            if let Some(spool) = env("GAMMU_SPOOL_PATH") {
                self.queue.dir = Some(Path::new(&spool).join("sms-queue"));
            }
        }
        let notices = &mut self.notices;
        override_parsed(&env, "QUEUE_POLL_INTERVAL", &mut self.queue.poll_interval_secs, notices);
        let mut max_attempts = i64::from(self.queue.max_attempts);
        override_parsed(&env, "QUEUE_MAX_RETRIES", &mut max_attempts, notices);
        self.queue.max_attempts = u32::try_from(max_attempts.max(1)).unwrap_or(u32::MAX);
        override_parsed(&env, "QUEUE_RETRY_DELAY", &mut self.queue.retry_delay_secs, notices);

        // Telegram.
        if let Some(v) = env("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(v);
        }
        if let Some(v) = env("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(v);
        }
        if let Some(v) = env("TELEGRAM_API_BASE") {
            self.telegram.api_base = v;
        }

        // Delivery.
        override_parsed(&env, "DELIVERY_MODE", &mut self.delivery.mode, &mut self.notices);

        // Logging.
        if let Some(v) = env("LOGLEVEL") {
            self.logging.level = v;
        }
        if let Some(v) = env("SMSGW_LOG_DIR") {
            self.logging.dir = Some(PathBuf::from(v));
        }
    }

    /// Emit the diagnostics gathered during loading.
    ///
    /// Call after logging is initialised; loading runs before it.
    pub fn log_notices(&self) {
        for notice in &self.notices {
            match notice {
                ConfigNotice::LoadedFile(path) => {
                    info!(path = %path.display(), "loaded config from file");
                }
                ConfigNotice::NoFile(path) => {
                    info!(path = %path.display(), "no config file found, using defaults");
                }
                ConfigNotice::InvalidOverride { var, value } => {
                    warn!(var = *var, value = %value, "ignoring invalid env override");
                }
            }
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on invalid TOML.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Bot API settings, requiring a non-empty token and chat id.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] naming the env var of the absent value.
    pub fn telegram_credentials(&self) -> Result<TelegramConfig, ConfigError> {
        let bot_token = non_empty(self.telegram.bot_token.as_deref())
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let chat_id = non_empty(self.telegram.chat_id.as_deref())
            .ok_or(ConfigError::Missing("TELEGRAM_CHAT_ID"))?;
        Ok(TelegramConfig {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
            api_base: self.telegram.api_base.clone(),
            timeout: Duration::from_secs(self.telegram.timeout_secs),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn override_parsed<T: FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    target: &mut T,
    notices: &mut Vec<ConfigNotice>,
) {
    if let Some(value) = env(var) {
        let parsed = value.trim().parse();
        match parsed {
            Ok(parsed) => *target = parsed,
            Err(_) => notices.push(ConfigNotice::InvalidOverride { var, value }),
        }
    }
}

/// Seconds as a [`Duration`]; negative or non-finite values become zero.
fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

// ── Queue config ────────────────────────────────────────────────

/// Queue location and worker pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue base directory. Unset means `$GAMMU_SPOOL_PATH/sms-queue`.
    pub dir: Option<PathBuf>,
    /// Idle sleep between polls, in seconds.
    pub poll_interval_secs: f64,
    /// Delivery attempts per record.
    pub max_attempts: u32,
    /// Pause between attempts, in seconds.
    pub retry_delay_secs: f64,
}

impl QueueConfig {
    /// Resolved base directory.
    pub fn dir(&self) -> PathBuf {
        self.dir
            .clone()
            .unwrap_or_else(|| Path::new(DEFAULT_SPOOL_PATH).join("sms-queue"))
    }

    /// Idle poll interval.
    pub fn poll_interval(&self) -> Duration {
        secs(self.poll_interval_secs)
    }

    /// Per-record retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, secs(self.retry_delay_secs))
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: None,
            poll_interval_secs: 2.0,
            max_attempts: 5,
            retry_delay_secs: 5.0,
        }
    }
}

// ── Telegram config ─────────────────────────────────────────────

/// Bot API settings as written in the config file.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSection {
    /// Bot token.
    pub bot_token: Option<String>,
    /// Destination chat id.
    pub chat_id: Option<String>,
    /// API base URL.
    pub api_base: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl fmt::Debug for TelegramSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSection")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "__REDACTED__"))
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Default for TelegramSection {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: crate::delivery::telegram::TELEGRAM_API_BASE.to_string(),
            timeout_secs: 10,
        }
    }
}

// ── Delivery config ─────────────────────────────────────────────

/// How `receive` hands a message off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Send synchronously with the long retry budget.
    #[default]
    Direct,
    /// Enqueue for the worker.
    Queue,
}

impl FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "queue" => Ok(Self::Queue),
            other => Err(format!("unknown delivery mode: {other}")),
        }
    }
}

/// Hand-off settings for `receive`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Direct send or enqueue.
    pub mode: DeliveryMode,
    /// Attempts for direct sends.
    pub direct_attempts: u32,
    /// Pause between direct attempts, in seconds.
    pub direct_delay_secs: u64,
}

impl DeliveryConfig {
    /// Retry budget for direct sends.
    pub fn direct_policy(&self) -> DirectPolicy {
        DirectPolicy {
            attempts: self.direct_attempts,
            delay: Duration::from_secs(self.direct_delay_secs),
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        let policy = DirectPolicy::default();
        Self {
            mode: DeliveryMode::default(),
            direct_attempts: policy.attempts,
            direct_delay_secs: policy.delay.as_secs(),
        }
    }
}

// ── Logging config ──────────────────────────────────────────────

/// Logging settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name or number; see [`crate::logging::parse_level`].
    pub level: String,
    /// Directory for daily-rotated JSON logs. Unset means stderr only.
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            dir: None,
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────
