// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the contact-shield service.
//!
//! Values are layered: serde defaults, then an optional TOML file
//! (`CONFIG_FILE`, default `contact-shield.toml`), then `SHIELD__`-prefixed
//! environment variables (`SHIELD__RATE_LIMIT__ABUSE_MAX_REQUESTS=50`), then
//! the well-known variables `PORT`, `ADMIN_API_KEY`, `FRONTEND_URL`,
//! `DATABASE_PATH`, `STATIC_DIR` and `APP_ENV`.

use ::config::{builder::DefaultState, ConfigBuilder, ConfigError, Environment as EnvSource, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::limiter::Tier;

/// Configuration for the contact-shield service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:3001)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment; development mode exposes storage error detail
    #[serde(default)]
    pub environment: Environment,

    /// Service name reported by the health endpoint
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Request guards (timeout, body size)
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Rate limiting tiers
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Contact form validation
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Cross-origin policy
    #[serde(default)]
    pub cors: CorsConfig,

    /// Admin API key policy
    #[serde(default)]
    pub admin: AdminConfig,

    /// Static frontend files
    #[serde(default)]
    pub static_files: StaticConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

/// Per-request guards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Wall-clock budget for a single request in seconds (default: 10)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum accepted request body in bytes (default: 1 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Use the first `X-Forwarded-For` entry as the client identifier (default: true)
    #[serde(default = "default_true")]
    pub trust_forwarded_for: bool,

    /// Requests served at once; further requests wait for a slot (default: 100)
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path of the SQLite file (default: db/contacts.db)
    #[serde(default = "default_database_path")]
    pub path: String,
}

/// Rate limiting configuration for the three shield tiers.
///
/// The abuse tier is the per-client burst guard with a hard block, the global
/// tier shapes overall traffic and the submission tier protects the
/// contact-form route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Abuse tier: maximum requests per window (default: 100)
    #[serde(default = "default_abuse_max_requests")]
    pub abuse_max_requests: u32,

    /// Abuse tier: window in seconds (default: 900)
    #[serde(default = "default_abuse_window_secs")]
    pub abuse_window_secs: u64,

    /// Abuse tier: block duration once the window is exhausted (default: 1800)
    #[serde(default = "default_abuse_block_secs")]
    pub abuse_block_secs: u64,

    /// Global tier: maximum requests per window (default: 100)
    #[serde(default = "default_global_max_requests")]
    pub global_max_requests: u32,

    /// Global tier: window in seconds (default: 900)
    #[serde(default = "default_global_window_secs")]
    pub global_window_secs: u64,

    /// Submission tier: maximum successful submissions per window (default: 5)
    #[serde(default = "default_submission_max_requests")]
    pub submission_max_requests: u32,

    /// Submission tier: window in seconds (default: 3600)
    #[serde(default = "default_submission_window_secs")]
    pub submission_window_secs: u64,

    /// Period of the background sweep in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Parameters of a single shield tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierConfig {
    pub max_requests: u32,
    pub window: Duration,
    /// `None` means the tier only throttles and never blocks.
    pub block: Option<Duration>,
}

/// Validation configuration for contact submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Minimum trimmed name length (default: 2)
    #[serde(default = "default_min_name_len")]
    pub min_name_len: usize,

    /// Minimum trimmed message length (default: 10)
    #[serde(default = "default_min_message_len")]
    pub min_message_len: usize,

    /// Maximum trimmed message length (default: 5000)
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,

    /// Keywords associated with unsolicited commercial content
    #[serde(default = "default_spam_keywords")]
    pub spam_keywords: Vec<String>,

    /// A message is spam when it matches more than this many keywords (default: 2)
    #[serde(default = "default_spam_threshold")]
    pub spam_threshold: usize,

    /// Disposable email domains that are refused
    #[serde(default = "default_blocked_domains")]
    pub blocked_domains: Vec<String>,

    /// Window in which a second submission from the same email is refused (default: 3600)
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
}

/// Cross-origin policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Mirror any request origin (default: true). When false only
    /// `allowed_origins` and `*.<allowed_suffix>` are accepted.
    #[serde(default = "default_true")]
    pub allow_any_origin: bool,

    /// Explicitly allowed origins
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    /// Host suffix accepted in strict mode (default: .vercel.app)
    #[serde(default = "default_allowed_suffix")]
    pub allowed_suffix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Static API key expected in `X-API-Key`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Require the API key for listing and status updates (default: false)
    #[serde(default)]
    pub protect_listing: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticConfig {
    /// Directory served for unmatched GET requests (default: frontend)
    #[serde(default = "default_static_dir")]
    pub dir: Option<String>,

    /// `max-age` for non-HTML assets in seconds (default: 3600)
    #[serde(default = "default_static_max_age_secs")]
    pub max_age_secs: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_service_name() -> String {
    "contact-shield".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_max_concurrent_requests() -> usize {
    100
}

fn default_database_path() -> String {
    "db/contacts.db".to_string()
}

fn default_abuse_max_requests() -> u32 {
    100
}

fn default_abuse_window_secs() -> u64 {
    15 * 60
}

fn default_abuse_block_secs() -> u64 {
    30 * 60
}

fn default_global_max_requests() -> u32 {
    100
}

fn default_global_window_secs() -> u64 {
    15 * 60
}

fn default_submission_max_requests() -> u32 {
    5
}

fn default_submission_window_secs() -> u64 {
    60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_min_name_len() -> usize {
    2
}

fn default_min_message_len() -> usize {
    10
}

fn default_max_message_len() -> usize {
    5000
}

fn default_spam_keywords() -> Vec<String> {
    [
        "buy now",
        "click here",
        "make money",
        "get rich",
        "viagra",
        "cialis",
        "casino",
        "lottery",
        "credit score",
        "debt relief",
        "work from home",
        "get paid",
        "investment",
        "bitcoin",
        "crypto",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_spam_threshold() -> usize {
    2
}

fn default_blocked_domains() -> Vec<String> {
    [
        "tempmail.com",
        "10minutemail.com",
        "guerrillamail.com",
        "mailinator.com",
        "yopmail.com",
        "trashmail.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_duplicate_window_secs() -> u64 {
    60 * 60
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:5500".to_string(),
        "http://127.0.0.1:5500".to_string(),
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}

fn default_allowed_suffix() -> Option<String> {
    Some(".vercel.app".to_string())
}

fn default_static_dir() -> Option<String> {
    Some("frontend".to_string())
}

fn default_static_max_age_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: Environment::default(),
            service_name: default_service_name(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            cors: CorsConfig::default(),
            admin: AdminConfig::default(),
            static_files: StaticConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            trust_forwarded_for: default_true(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            abuse_max_requests: default_abuse_max_requests(),
            abuse_window_secs: default_abuse_window_secs(),
            abuse_block_secs: default_abuse_block_secs(),
            global_max_requests: default_global_max_requests(),
            global_window_secs: default_global_window_secs(),
            submission_max_requests: default_submission_max_requests(),
            submission_window_secs: default_submission_window_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_name_len: default_min_name_len(),
            min_message_len: default_min_message_len(),
            max_message_len: default_max_message_len(),
            spam_keywords: default_spam_keywords(),
            spam_threshold: default_spam_threshold(),
            blocked_domains: default_blocked_domains(),
            duplicate_window_secs: default_duplicate_window_secs(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: default_true(),
            allowed_origins: default_allowed_origins(),
            allowed_suffix: default_allowed_suffix(),
        }
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            dir: default_static_dir(),
            max_age_secs: default_static_max_age_secs(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "contact-shield.toml".to_string());
        let builder = ::config::Config::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                EnvSource::with_prefix("SHIELD")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .with_list_parse_key("validation.spam_keywords")
                    .with_list_parse_key("validation.blocked_domains"),
            )
            .set_override_option(
                "bind_addr",
                std::env::var("PORT").ok().map(|port| format!("0.0.0.0:{port}")),
            )?
            .set_override_option("admin.api_key", std::env::var("ADMIN_API_KEY").ok())?
            .set_override_option("database.path", std::env::var("DATABASE_PATH").ok())?
            .set_override_option("static_files.dir", std::env::var("STATIC_DIR").ok())?
            .set_override_option("environment", std::env::var("APP_ENV").ok())?;

        let mut config = Self::build(builder)?;
        if let Ok(frontend) = std::env::var("FRONTEND_URL") {
            if !config.cors.add_origin(&frontend) {
                warn!(origin = %frontend, "Ignoring FRONTEND_URL that is not a valid origin");
            }
        }
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        Self::build(
            ::config::Config::builder().add_source(File::from_str(toml, ::config::FileFormat::Toml)),
        )
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let mut config: Self = builder.build()?.try_deserialize()?;
        config.cors.allowed_origins = config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|origin| normalize_origin(origin))
            .collect();
        Ok(config)
    }

    /// Whether storage error detail may be exposed to clients.
    pub fn expose_error_detail(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Get the per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Concurrency cap for the router, never below one.
    pub fn concurrency_limit(&self) -> usize {
        self.server.max_concurrent_requests.max(1)
    }
}

impl CorsConfig {
    /// Add an origin to the allow-list in its normalized form. Returns
    /// `false` when the value is not a usable origin.
    pub fn add_origin(&mut self, origin: &str) -> bool {
        let Some(origin) = normalize_origin(origin) else {
            return false;
        };
        if !self.allowed_origins.contains(&origin) {
            self.allowed_origins.push(origin);
        }
        true
    }
}

impl RateLimitConfig {
    /// Parameters for one shield tier.
    pub fn tier(&self, tier: Tier) -> TierConfig {
        match tier {
            Tier::Abuse => TierConfig {
                max_requests: self.abuse_max_requests,
                window: Duration::from_secs(self.abuse_window_secs),
                block: (self.abuse_block_secs > 0)
                    .then(|| Duration::from_secs(self.abuse_block_secs)),
            },
            Tier::Global => TierConfig {
                max_requests: self.global_max_requests,
                window: Duration::from_secs(self.global_window_secs),
                block: None,
            },
            Tier::Submission => TierConfig {
                max_requests: self.submission_max_requests,
                window: Duration::from_secs(self.submission_window_secs),
                block: None,
            },
        }
    }

    /// Get the sweep period.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl ValidationConfig {
    /// Get the duplicate-submission window.
    pub fn duplicate_window(&self) -> Duration {
        Duration::from_secs(self.duplicate_window_secs)
    }
}

/// Reduce an origin to `scheme://host[:port]`, dropping paths and trailing
/// slashes. Unparseable entries are discarded.
fn normalize_origin(origin: &str) -> Option<String> {
    let parsed = url::Url::parse(origin.trim()).ok()?;
    match parsed.origin() {
        url::Origin::Tuple(..) => Some(parsed.origin().ascii_serialization()),
        url::Origin::Opaque(_) => None,
    }
}
