//! Core types shared across faucet components.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

use crate::constants::{
    DAILY_COOLDOWN_MS, DAILY_REWARD_UNITS, FIVE_MINUTE_COOLDOWN_MS, FIVE_MINUTE_REWARD_UNITS,
    UNITS_PER_COIN,
};

/// Authenticated user identity (the login email).
/// Opaque to the faucet: only compared and used as a store key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from user input, rejecting blank values
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Stored keys go through the same normalization as login input
impl<'de> Deserialize<'de> for Identity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Identity::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom("identity must not be blank"))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AmountError {
    #[error("amount must be a finite, non-negative number (got {0})")]
    Invalid(f64),
    #[error("amount {0} is too large")]
    Overflow(f64),
}

/// Reward-currency amount in base units (1 coin = 100_000_000 units).
///
/// Unsigned, so a balance can never go below zero. Rendered as a decimal
/// number in JSON, which keeps snapshots readable and compatible with
/// decimal-valued data files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub const fn from_units(units: u64) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse a decimal coin amount, rounding to the nearest base unit
    pub fn from_decimal(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() || value < 0.0 {
            return Err(AmountError::Invalid(value));
        }
        let units = (value * UNITS_PER_COIN as f64).round();
        if units > u64::MAX as f64 {
            return Err(AmountError::Overflow(value));
        }
        Ok(Self(units as u64))
    }

    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / UNITS_PER_COIN as f64
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:08}",
            self.0 / UNITS_PER_COIN,
            self.0 % UNITS_PER_COIN
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Amount::from_decimal(value).map_err(serde::de::Error::custom)
    }
}

/// The two claim schedules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// Claimable every 5 minutes
    FiveMinute,
    /// Claimable once per 24 hours
    Daily,
}

impl ClaimKind {
    pub const ALL: [ClaimKind; 2] = [ClaimKind::FiveMinute, ClaimKind::Daily];

    /// Fixed reward credited on a successful claim
    pub fn reward(&self) -> Amount {
        match self {
            Self::FiveMinute => Amount::from_units(FIVE_MINUTE_REWARD_UNITS),
            Self::Daily => Amount::from_units(DAILY_REWARD_UNITS),
        }
    }

    /// Minimum time between two claims of this kind
    pub fn cooldown_ms(&self) -> i64 {
        match self {
            Self::FiveMinute => FIVE_MINUTE_COOLDOWN_MS,
            Self::Daily => DAILY_COOLDOWN_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FiveMinute => "five_minute",
            Self::Daily => "daily",
        }
    }
}

/// Persisted per-user faucet state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub balance: Amount,

    /// Epoch millis of the last five-minute claim, 0 if never claimed
    #[serde(rename = "last5", alias = "lastFiveMinClaim", default)]
    pub last_five_min_claim: i64,

    /// Epoch millis of the last daily claim, 0 if never claimed
    #[serde(rename = "lastDaily", alias = "lastDailyClaim", default)]
    pub last_daily_claim: i64,
}

impl UserRecord {
    pub fn last_claim(&self, kind: ClaimKind) -> i64 {
        match kind {
            ClaimKind::FiveMinute => self.last_five_min_claim,
            ClaimKind::Daily => self.last_daily_claim,
        }
    }

    pub fn set_last_claim(&mut self, kind: ClaimKind, at: i64) {
        match kind {
            ClaimKind::FiveMinute => self.last_five_min_claim = at,
            ClaimKind::Daily => self.last_daily_claim = at,
        }
    }

    /// Milliseconds until a claim of `kind` is allowed (0 = now)
    pub fn ready_in(&self, kind: ClaimKind, now: i64) -> u64 {
        cooldown::remaining(self.last_claim(kind), now, kind.cooldown_ms())
    }
}

/// Claim eligibility policy.
pub mod cooldown {
    /// True iff `now - last_claim >= interval`. A zero timestamp means the
    /// claim was never made and is always eligible.
    pub fn eligible(last_claim: i64, now: i64, interval: i64) -> bool {
        last_claim == 0 || now.saturating_sub(last_claim) >= interval
    }

    /// Milliseconds left before `eligible` turns true, capped at `interval`
    pub fn remaining(last_claim: i64, now: i64, interval: i64) -> u64 {
        if eligible(last_claim, now, interval) {
            return 0;
        }
        let elapsed = now.saturating_sub(last_claim).max(0);
        (interval - elapsed).clamp(0, interval) as u64
    }
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
