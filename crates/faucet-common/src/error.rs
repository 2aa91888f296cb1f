//! Request-level error taxonomy for the faucet service.

use thiserror::Error;

/// Required request inputs that can be missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    /// Login identity (email)
    Identity,
    /// Payout destination address
    Address,
    /// CAPTCHA response token
    Token,
}

impl InputField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Address => "address",
            Self::Token => "token",
        }
    }
}

/// Every way a faucet request can fail
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FaucetError {
    /// No authenticated session
    #[error("Not authenticated")]
    Unauthenticated,

    /// A required field was absent or blank
    #[error("Missing required input: {}", .0.as_str())]
    MissingInput(InputField),

    /// The CAPTCHA provider did not confirm the token
    #[error("CAPTCHA verification failed")]
    CaptchaInvalid,

    /// The claim interval has not elapsed yet
    #[error("Cooldown active: try again in {} seconds", .remaining_ms.div_ceil(1000))]
    CooldownActive { remaining_ms: u64 },

    /// Nothing to withdraw
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// The payout provider answered but refused the send
    #[error("Payout rejected by provider (status {status}): {message}")]
    PayoutRejected { status: i64, message: String },

    /// The payout provider could not be reached or gave no usable answer
    #[error("Payout provider unreachable: {0}")]
    PayoutUnreachable(String),

    /// Reading or writing the persisted store failed
    #[error("Store I/O error: {0}")]
    StoreIo(String),

    /// Malformed request body
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl FaucetError {
    /// Stable machine-readable code reported in the `error` field
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::MissingInput(InputField::Identity) => "IdentityRequired",
            Self::MissingInput(InputField::Address) => "AddressRequired",
            Self::MissingInput(InputField::Token) => "CaptchaRequired",
            Self::CaptchaInvalid => "CaptchaInvalid",
            Self::CooldownActive { .. } => "CooldownActive",
            Self::InsufficientBalance => "InsufficientBalance",
            Self::PayoutRejected { .. } | Self::PayoutUnreachable(_) => "PayoutFailed",
            Self::StoreIo(_) => "StoreIOError",
            Self::BadRequest(_) => "BadRequest",
        }
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthenticated => 401,
            Self::MissingInput(_) => 400,
            Self::CaptchaInvalid => 403,
            Self::CooldownActive { .. } => 429,
            Self::InsufficientBalance => 400,
            Self::PayoutRejected { .. } | Self::PayoutUnreachable(_) => 502,
            Self::StoreIo(_) => 500,
            Self::BadRequest(_) => 400,
        }
    }

    /// Sub-classification of payout failures
    pub fn payout_reason(&self) -> Option<&'static str> {
        match self {
            Self::PayoutRejected { .. } => Some("rejected"),
            Self::PayoutUnreachable(_) => Some("unreachable"),
            _ => None,
        }
    }

    /// Returns true if repeating the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CooldownActive { .. } | Self::PayoutUnreachable(_) | Self::StoreIo(_)
        )
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
