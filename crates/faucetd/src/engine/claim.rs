//! Claim engine: session -> captcha -> cooldown -> credit -> persist.

use faucet_common::{Amount, ClaimKind, FaucetError, FaucetResult, Identity, InputField};
use serde::Serialize;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{Clock, system_clock};
use crate::captcha::CaptchaVerifier;
use crate::store::{OnWriteFailure, UserStore};

/// Result of a successful claim
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimOutcome {
    pub kind: ClaimKind,
    pub reward: Amount,
    pub balance: Amount,
    pub claimed_at: i64,
}

pub struct ClaimEngine {
    store: Arc<UserStore>,
    captcha: Option<Arc<dyn CaptchaVerifier>>,
    clock: Clock,
}

impl ClaimEngine {
    /// `captcha` is `None` for deployments without CAPTCHA protection
    pub fn new(store: Arc<UserStore>, captcha: Option<Arc<dyn CaptchaVerifier>>) -> Self {
        Self::with_clock(store, captcha, system_clock())
    }

    pub fn with_clock(
        store: Arc<UserStore>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        clock: Clock,
    ) -> Self {
        Self {
            store,
            captcha,
            clock,
        }
    }

    pub fn captcha_required(&self) -> bool {
        self.captcha.is_some()
    }

    pub async fn claim(
        &self,
        identity: Option<&Identity>,
        kind: ClaimKind,
        token: Option<&str>,
        remote_ip: Option<IpAddr>,
    ) -> FaucetResult<ClaimOutcome> {
        let identity = identity.ok_or(FaucetError::Unauthenticated)?;

        if let Some(verifier) = &self.captcha {
            let token = token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(FaucetError::MissingInput(InputField::Token))?;

            if !verifier.verify(token, remote_ip).await {
                warn!(identity = %identity, kind = kind.as_str(), remote_ip = ?remote_ip, "CAPTCHA check failed");
                return Err(FaucetError::CaptchaInvalid);
            }
        }

        let _guard = self.store.lock(identity).await;

        // Records are created at login; a session for an unknown identity is stale
        let mut record = self
            .store
            .get(identity)
            .await
            .ok_or(FaucetError::Unauthenticated)?;

        let now = (self.clock)();
        let remaining_ms = record.ready_in(kind, now);
        if remaining_ms > 0 {
            debug!(identity = %identity, kind = kind.as_str(), remaining_ms, "Claim on cooldown");
            return Err(FaucetError::CooldownActive { remaining_ms });
        }

        let reward = kind.reward();
        record.balance = record
            .balance
            .checked_add(reward)
            .ok_or_else(|| FaucetError::BadRequest("balance limit reached".to_string()))?;
        record.set_last_claim(kind, now);
        let balance = record.balance;

        self.store
            .put(identity, record, OnWriteFailure::Rollback)
            .await?;

        info!(
            identity = %identity,
            kind = kind.as_str(),
            reward = %reward,
            balance = %balance,
            "Reward claimed"
        );

        Ok(ClaimOutcome {
            kind,
            reward,
            balance,
            claimed_at: now,
        })
    }
}
