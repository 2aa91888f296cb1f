//! Payout provider integration.

mod client;

pub use client::HttpPayoutClient;

use async_trait::async_trait;
use faucet_common::{Amount, FaucetError};
use serde::Serialize;
use thiserror::Error;

/// A single send to an external address
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRequest {
    pub to: String,
    pub amount: Amount,
    pub currency: String,
}

/// Proof that the provider confirmed a send
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayoutReceipt {
    pub to: String,
    pub amount: Amount,
    pub currency: String,
    /// Provider-side transfer id, when it reports one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayoutError {
    /// The provider answered with a non-success status
    #[error("provider rejected payout (status {status}): {message}")]
    Rejected { status: i64, message: String },

    /// Transport failure, timeout, or an answer that confirms nothing
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

impl From<PayoutError> for FaucetError {
    fn from(err: PayoutError) -> Self {
        match err {
            PayoutError::Rejected { status, message } => {
                FaucetError::PayoutRejected { status, message }
            }
            PayoutError::Unreachable(reason) => FaucetError::PayoutUnreachable(reason),
        }
    }
}

/// External service that moves funds to a user-supplied address
#[async_trait]
pub trait PayoutProvider: Send + Sync {
    /// Resolves `Ok` only on a confirmed send
    async fn send(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError>;
}
