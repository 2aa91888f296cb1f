//! Application state and shared resources.

use anyhow::Result;
use std::sync::Arc;

use crate::captcha::{CaptchaVerifier, SiteVerifyClient};
use crate::config::AppConfig;
use crate::engine::{ClaimEngine, WithdrawalEngine};
use crate::payout::{HttpPayoutClient, PayoutProvider};
use crate::session::SessionStore;
use crate::store::UserStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Persisted balances and cooldowns
    pub store: Arc<UserStore>,

    /// Login sessions
    pub sessions: Arc<SessionStore>,

    /// Reward claims
    pub claims: Arc<ClaimEngine>,

    /// Payouts
    pub withdrawals: Arc<WithdrawalEngine>,

    /// Honour `X-Forwarded-For` when resolving the client address
    pub trust_forwarded_for: bool,
}

impl AppState {
    /// Open the store and build the provider clients described by `config`
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let store = Arc::new(UserStore::open(&config.store_path).await?);

        let captcha: Option<Arc<dyn CaptchaVerifier>> = if config.captcha.enabled {
            let secret = config.captcha.secret.clone().unwrap_or_default();
            Some(Arc::new(SiteVerifyClient::new(
                config.captcha.verify_url.clone(),
                secret,
                config.captcha.timeout(),
            )?))
        } else {
            None
        };

        let payout: Arc<dyn PayoutProvider> = Arc::new(HttpPayoutClient::new(
            config.payout.send_url.clone(),
            config.payout.api_key.clone(),
            config.payout.timeout(),
        )?);

        let sessions = Arc::new(SessionStore::new(
            config.session.ttl_secs,
            config.session.secure_cookie,
        ));

        let mut state = Self::from_parts(
            store,
            sessions,
            captcha,
            payout,
            config.payout.currency.clone(),
        );
        state.trust_forwarded_for = config.trust_forwarded_for;
        Ok(state)
    }

    /// Assemble state from already-built collaborators
    pub fn from_parts(
        store: Arc<UserStore>,
        sessions: Arc<SessionStore>,
        captcha: Option<Arc<dyn CaptchaVerifier>>,
        payout: Arc<dyn PayoutProvider>,
        currency: String,
    ) -> Self {
        let claims = Arc::new(ClaimEngine::new(store.clone(), captcha));
        let withdrawals = Arc::new(WithdrawalEngine::new(store.clone(), payout, currency));

        Self {
            store,
            sessions,
            claims,
            withdrawals,
            trust_forwarded_for: false,
        }
    }
}
