// ============================
// crates/backend-lib/src/config.rs
// ============================
//! Configuration management.
//!
//! Layers, later wins: built-in defaults, an optional TOML file, then
//! `HABITS_`-prefixed environment variables (`__` separates sections, e.g.
//! `HABITS_AUTH__JWT_SECRET`).
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::lockout::{DEFAULT_LOCK_THRESHOLD, DEFAULT_LOCK_WINDOW_SECS};
use crate::auth::password::{DEFAULT_PASSWORD_COST, PASSWORD_COST_RANGE};
use crate::auth::token::DEFAULT_TOKEN_TTL_SECS;
use crate::middleware::rate_limit::{DEFAULT_BURST, DEFAULT_REQUESTS_PER_SECOND};

/// Config file read when no explicit path is given
pub const DEFAULT_CONFIG_FILE: &str = "habits.toml";

/// Upper bound for token lifetime and lockout window (ten years)
pub const MAX_DURATION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

const DEVELOPMENT: &str = "development";
const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment; `development` relaxes secret handling
    pub env: String,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub rate_limit: RateLimitSettings,
    pub storage: StorageSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Token and lockout parameters
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    /// Consecutive failures before an identity locks
    pub lock_threshold: u32,
    pub lock_window_secs: i64,
    /// scrypt `log2(N)`
    pub password_cost: u8,
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("lock_threshold", &self.lock_threshold)
            .field("lock_window_secs", &self.lock_window_secs)
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitSettings {
    pub requests_per_second: f64,
    pub burst: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    FlatFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Root directory of the flat-file store
    pub path: PathBuf,
    /// JSON-lines activity log; activity goes to the tracing log when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_log: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    /// Emit JSON log lines instead of the human-readable format
    pub json: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: DEVELOPMENT.to_string(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            rate_limit: RateLimitSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            lock_threshold: DEFAULT_LOCK_THRESHOLD,
            lock_window_secs: DEFAULT_LOCK_WINDOW_SECS,
            password_cost: DEFAULT_PASSWORD_COST,
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            burst: DEFAULT_BURST,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: PathBuf::from("data"),
            activity_log: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ServerSettings {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }
}

impl AuthSettings {
    /// Token lifetime, clamped to `0..=MAX_DURATION_SECS`
    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_ttl_secs.clamp(0, MAX_DURATION_SECS))
    }

    /// Lockout window, clamped to `0..=MAX_DURATION_SECS`
    pub fn lock_window(&self) -> Duration {
        Duration::seconds(self.lock_window_secs.clamp(0, MAX_DURATION_SECS))
    }
}

impl Settings {
    /// Load from `habits.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file, then fill and validate
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut settings = Self::figment(path)
            .extract::<Self>()
            .context("failed to load settings")?;
        settings.ensure_secret()?;
        settings.validate()?;
        Ok(settings)
    }

    /// The provider stack, exposed so callers can add their own layers
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed("HABITS_").split("__"))
    }

    pub fn is_development(&self) -> bool {
        self.env == DEVELOPMENT
    }

    /// Generate a throwaway signing secret in development; refuse elsewhere
    pub fn ensure_secret(&mut self) -> Result<()> {
        if !self.auth.jwt_secret.is_empty() {
            return Ok(());
        }
        if !self.is_development() {
            bail!("auth.jwt_secret must be set outside development");
        }

        let bytes: [u8; 32] = rand::random();
        self.auth.jwt_secret = bytes.iter().map(|b| format!("{b:02x}")).collect();
        warn!("auth.jwt_secret is empty; using a random secret, tokens will not survive a restart");
        Ok(())
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret must not be empty");
        }
        if !(1..=MAX_DURATION_SECS).contains(&self.auth.token_ttl_secs) {
            bail!("auth.token_ttl_secs must be within 1..={MAX_DURATION_SECS}");
        }
        if self.auth.lock_threshold == 0 {
            bail!("auth.lock_threshold must be at least 1");
        }
        if !(1..=MAX_DURATION_SECS).contains(&self.auth.lock_window_secs) {
            bail!("auth.lock_window_secs must be within 1..={MAX_DURATION_SECS}");
        }
        if !PASSWORD_COST_RANGE.contains(&self.auth.password_cost) {
            bail!(
                "auth.password_cost must be within {}..={}",
                PASSWORD_COST_RANGE.start(),
                PASSWORD_COST_RANGE.end()
            );
        }
        let rate = self.rate_limit.requests_per_second;
        if !rate.is_finite() || rate <= 0.0 {
            bail!("rate_limit.requests_per_second must be positive");
        }
        if self.rate_limit.burst == 0 {
            bail!("rate_limit.burst must be at least 1");
        }
        if !VALID_LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            bail!("logging.level must be one of {}", VALID_LOG_LEVELS.join(", "));
        }
        self.server.bind_addr()?;
        Ok(())
    }
}
