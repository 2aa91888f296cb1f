//! CAPTCHA verification.
//!
//! The faucet never renders challenges itself; the browser solves them with
//! a third-party widget and the resulting token is checked server-side
//! against a siteverify endpoint.

mod verifier;

pub use verifier::SiteVerifyClient;

use async_trait::async_trait;
use std::net::IpAddr;

/// Human-presence check performed before a claim
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    /// Returns true only when the provider positively confirms `token`.
    /// Every failure (transport, timeout, bad response) returns false.
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> bool;
}
