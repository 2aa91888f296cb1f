//! Configuration management for faucetd.
//!
//! Precedence (lowest to highest): built-in defaults, TOML file,
//! `FAUCET_*` environment variables, command-line flags.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use faucet_common::constants::{
    DEFAULT_CAPTCHA_VERIFY_URL, DEFAULT_EXTERNAL_TIMEOUT_SECS, DEFAULT_LISTEN_ADDR,
    DEFAULT_PAYOUT_CURRENCY, DEFAULT_PAYOUT_SEND_URL, DEFAULT_SESSION_TTL_SECS,
    DEFAULT_STORE_PATH,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// User store snapshot file
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Allow cross-origin browser requests
    #[serde(default)]
    pub cors_enabled: bool,

    /// Take the client address from `X-Forwarded-For` (behind a trusted proxy only)
    #[serde(default)]
    pub trust_forwarded_for: bool,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// CAPTCHA configuration
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Payout provider configuration
    #[serde(default)]
    pub payout: PayoutConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in seconds
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,

    /// Mark the session cookie `Secure` (HTTPS deployments)
    #[serde(default)]
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            secure_cookie: false,
        }
    }
}

/// CAPTCHA-specific configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CaptchaConfig {
    /// Require a CAPTCHA token on every claim
    #[serde(default)]
    pub enabled: bool,

    /// Provider secret key
    #[serde(default)]
    pub secret: Option<String>,

    /// Siteverify endpoint
    #[serde(default = "default_captcha_verify_url")]
    pub verify_url: String,

    /// Timeout for one verification call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: None,
            verify_url: default_captcha_verify_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Payout provider configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PayoutConfig {
    /// Provider API key
    #[serde(default)]
    pub api_key: String,

    /// Send endpoint
    #[serde(default = "default_payout_send_url")]
    pub send_url: String,

    /// Currency code sent with every payout
    #[serde(default = "default_payout_currency")]
    pub currency: String,

    /// Timeout for one payout call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for PayoutConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            send_url: default_payout_send_url(),
            currency: default_payout_currency(),
            timeout_secs: default_timeout(),
        }
    }
}

impl CaptchaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl PayoutConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// Default value functions
fn default_listen_addr() -> String { DEFAULT_LISTEN_ADDR.to_string() }
fn default_store_path() -> String { DEFAULT_STORE_PATH.to_string() }
fn default_session_ttl() -> u64 { DEFAULT_SESSION_TTL_SECS }
fn default_captcha_verify_url() -> String { DEFAULT_CAPTCHA_VERIFY_URL.to_string() }
fn default_payout_send_url() -> String { DEFAULT_PAYOUT_SEND_URL.to_string() }
fn default_payout_currency() -> String { DEFAULT_PAYOUT_CURRENCY.to_string() }
fn default_timeout() -> u64 { DEFAULT_EXTERNAL_TIMEOUT_SECS }

impl AppConfig {
    /// Load configuration from file and environment, with CLI overrides
    pub fn load(config_path: &str, args: &super::Args) -> Result<Self> {
        let mut builder = config::Config::builder();

        if Path::new(config_path).exists() {
            builder = builder.add_source(config::File::with_name(config_path));
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("FAUCET")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration")?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .context("Failed to parse configuration")?;

        // Apply CLI overrides
        if let Some(ref listen) = args.listen {
            config.listen_addr = listen.clone();
        }
        if let Some(ref store) = args.store {
            config.store_path = store.clone();
        }
        if let Some(ref secret) = args.captcha_secret {
            config.captcha.secret = Some(secret.clone());
        }
        if let Some(ref api_key) = args.payout_api_key {
            config.payout.api_key = api_key.clone();
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot serve requests correctly
    pub fn validate(&self) -> Result<()> {
        if self.captcha.enabled
            && self.captcha.secret.as_deref().is_none_or(|s| s.trim().is_empty())
        {
            bail!("captcha.enabled is set but no captcha secret is configured");
        }
        if self.payout.currency.trim().is_empty() {
            bail!("payout.currency must not be empty");
        }
        if self.payout.api_key.trim().is_empty() {
            tracing::warn!("No payout API key configured; withdrawals will be rejected by the provider");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            store_path: default_store_path(),
            cors_enabled: false,
            trust_forwarded_for: false,
            session: SessionConfig::default(),
            captcha: CaptchaConfig::default(),
            payout: PayoutConfig::default(),
        }
    }
}
