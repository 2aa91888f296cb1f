//! Login, logout and account status.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Redirect, Response},
};
use faucet_common::{Amount, ClaimKind, FaucetError, Identity, InputField, now_millis};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{ApiError, CurrentIdentity, parse_body};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default, alias = "email")]
    pub identity: Option<String>,
}

/// Start a session for the submitted identity, creating its record on first login
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let request: LoginRequest = parse_body(&body)?;
    let identity = request
        .identity
        .as_deref()
        .and_then(Identity::parse)
        .ok_or(FaucetError::MissingInput(InputField::Identity))?;

    state.store.ensure(&identity).await?;

    // Logging in again replaces whatever session the browser held
    state.sessions.terminate(&headers);
    let session_id = state.sessions.establish(identity.clone());

    info!(identity = %identity, "Session established");

    Ok((
        [(header::SET_COOKIE, state.sessions.set_cookie(&session_id))],
        Json(json!({ "success": true })),
    )
        .into_response())
}

/// End the session (API form)
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    end_session(&state, &headers);
    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(json!({ "success": true })),
    )
        .into_response()
}

/// End the session and send the browser back to the landing page
pub async fn logout_redirect(State(state): State<AppState>, headers: HeaderMap) -> Response {
    end_session(&state, &headers);
    (
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

fn end_session(state: &AppState, headers: &HeaderMap) {
    if let Some(identity) = state.sessions.terminate(headers) {
        info!(identity = %identity, "Session ended");
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    success: bool,
    logged: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    balance: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_five_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_daily: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    five_min_ready_in_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    daily_ready_in_ms: Option<u64>,
    captcha_required: bool,
}

/// Report the caller's balance and cooldowns; never fails
pub async fn status(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Json<StatusResponse> {
    let captcha_required = state.claims.captcha_required();

    let record = match identity {
        Some(identity) => state.store.get(&identity).await,
        None => None,
    };

    let Some(record) = record else {
        return Json(StatusResponse {
            success: true,
            logged: false,
            balance: None,
            last_five_min: None,
            last_daily: None,
            five_min_ready_in_ms: None,
            daily_ready_in_ms: None,
            captcha_required,
        });
    };

    let now = now_millis();
    Json(StatusResponse {
        success: true,
        logged: true,
        balance: Some(record.balance),
        last_five_min: Some(record.last_five_min_claim),
        last_daily: Some(record.last_daily_claim),
        five_min_ready_in_ms: Some(record.ready_in(ClaimKind::FiveMinute, now)),
        daily_ready_in_ms: Some(record.ready_in(ClaimKind::Daily, now)),
        captcha_required,
    })
}
