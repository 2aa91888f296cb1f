//! Shared constants for the faucet service.

/// Base units per whole coin (8 decimal places)
pub const UNITS_PER_COIN: u64 = 100_000_000;

/// Five-minute claim reward in base units (0.00001)
pub const FIVE_MINUTE_REWARD_UNITS: u64 = 1_000;

/// Daily claim reward in base units (0.0001)
pub const DAILY_REWARD_UNITS: u64 = 10_000;

/// Five-minute claim cooldown in milliseconds
pub const FIVE_MINUTE_COOLDOWN_MS: i64 = 5 * 60 * 1000;

/// Daily claim cooldown in milliseconds
pub const DAILY_COOLDOWN_MS: i64 = 24 * 60 * 60 * 1000;

/// Default HTTP listen address
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:3000";

/// Default snapshot file for the user store
pub const DEFAULT_STORE_PATH: &str = "data.json";

/// Default session lifetime (24 hours)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 86_400;

/// Default timeout for outbound provider calls
pub const DEFAULT_EXTERNAL_TIMEOUT_SECS: u64 = 10;

/// Default siteverify endpoint
pub const DEFAULT_CAPTCHA_VERIFY_URL: &str = "https://hcaptcha.com/siteverify";

/// Default payout send endpoint
pub const DEFAULT_PAYOUT_SEND_URL: &str = "https://faucetpay.io/api/v1/send";

/// Default payout currency
pub const DEFAULT_PAYOUT_CURRENCY: &str = "BTC";

/// Payout response status that confirms a send
pub const PAYOUT_SUCCESS_STATUS: i64 = 200;

/// How long a confirmed withdrawal stays replayable by idempotency key (24 hours)
pub const IDEMPOTENCY_TTL_SECS: u64 = 86_400;

/// Maximum remembered idempotency receipts
pub const IDEMPOTENCY_CAPACITY: u64 = 10_000;

/// Session cookie name
pub const SESSION_COOKIE_NAME: &str = "faucet_session";

/// HTTP header names
pub mod headers {
    /// Client-supplied key making a withdrawal replay-safe
    pub const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

    /// Client address as seen by a reverse proxy
    pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";
}
