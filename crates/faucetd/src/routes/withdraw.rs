//! Withdrawal endpoint.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use faucet_common::Amount;
use faucet_common::constants::headers::IDEMPOTENCY_KEY;
use serde::{Deserialize, Serialize};

use super::{ApiError, CurrentIdentity, parse_body};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WithdrawRequest {
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    success: bool,
    amount: Amount,
    currency: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    payout_id: Option<String>,
}

/// Pay the caller's whole balance out to `address`
pub async fn withdraw(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WithdrawResponse>, ApiError> {
    let request: WithdrawRequest = parse_body(&body)?;
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY)
        .and_then(|v| v.to_str().ok());

    let receipt = state
        .withdrawals
        .withdraw(
            identity.as_ref(),
            request.address.as_deref().unwrap_or_default(),
            idempotency_key,
        )
        .await?;

    Ok(Json(WithdrawResponse {
        success: true,
        amount: receipt.amount,
        currency: receipt.currency,
        to: receipt.to,
        payout_id: receipt.payout_id,
    }))
}
