//! Reward claim endpoints.

use axum::{Json, body::Bytes, extract::State};
use faucet_common::{Amount, ClaimKind, Identity};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::{ApiError, ClientIp, CurrentIdentity, parse_body};
use crate::state::AppState;

/// Claim body; the token may arrive under any of the widget field names
#[derive(Debug, Default, Deserialize)]
pub struct ClaimRequest {
    #[serde(
        default,
        alias = "captcha",
        alias = "h-captcha-response",
        alias = "g-recaptcha-response",
        alias = "cf-turnstile-response"
    )]
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    success: bool,
    kind: ClaimKind,
    reward: Amount,
    balance: Amount,
}

pub async fn claim_five_minute(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ClientIp(remote_ip): ClientIp,
    body: Bytes,
) -> Result<Json<ClaimResponse>, ApiError> {
    claim(state, identity, remote_ip, body, ClaimKind::FiveMinute).await
}

pub async fn claim_daily(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    ClientIp(remote_ip): ClientIp,
    body: Bytes,
) -> Result<Json<ClaimResponse>, ApiError> {
    claim(state, identity, remote_ip, body, ClaimKind::Daily).await
}

async fn claim(
    state: AppState,
    identity: Option<Identity>,
    remote_ip: Option<IpAddr>,
    body: Bytes,
    kind: ClaimKind,
) -> Result<Json<ClaimResponse>, ApiError> {
    let request: ClaimRequest = parse_body(&body)?;

    let outcome = state
        .claims
        .claim(identity.as_ref(), kind, request.token.as_deref(), remote_ip)
        .await?;

    Ok(Json(ClaimResponse {
        success: true,
        kind: outcome.kind,
        reward: outcome.reward,
        balance: outcome.balance,
    }))
}
