//! HTTP route handlers for faucetd.
//!
//! Every response body is JSON shaped `{ success, error?, message?, ... }`.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{ConnectInfo, FromRequestParts},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use faucet_common::constants::headers::X_FORWARDED_FOR;
use faucet_common::{FaucetError, Identity};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod claim;
mod health;
mod withdraw;

/// Create the main application router
pub fn create_router(state: AppState, cors_enabled: bool) -> Router {
    let mut router = Router::new()
        // Health & Status
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))

        // Session
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout).get(auth::logout_redirect))
        .route("/status", get(auth::status))

        // Rewards
        .route("/claim/five_minute", post(claim::claim_five_minute))
        .route("/claim/5min", post(claim::claim_five_minute))
        .route("/claim/daily", post(claim::claim_daily))
        .route("/withdraw", post(withdraw::withdraw))

        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state);

    if cors_enabled {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router
}

/// Identity behind the request's session cookie, if any
pub struct CurrentIdentity(pub Option<Identity>);

impl FromRequestParts<AppState> for CurrentIdentity {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(state.sessions.current_identity(&parts.headers)))
    }
}

/// Client address: the TCP peer, or the first `X-Forwarded-For` hop when
/// the deployment sits behind a trusted proxy
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        if !state.trust_forwarded_for {
            return Ok(Self(peer));
        }

        let forwarded = parts
            .headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|ip| ip.trim().parse().ok());

        Ok(Self(forwarded.or(peer)))
    }
}

/// Request-boundary wrapper turning a `FaucetError` into a JSON failure
#[derive(Debug)]
pub struct ApiError(pub FaucetError);

impl From<FaucetError> for ApiError {
    fn from(err: FaucetError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_in_ms: Option<u64>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        // Storage details stay in the logs
        let message = match &err {
            FaucetError::StoreIo(_) => "Internal storage error, please retry later".to_string(),
            other => other.to_string(),
        };

        let retry_in_ms = match &err {
            FaucetError::CooldownActive { remaining_ms } => Some(*remaining_ms),
            _ => None,
        };

        let body = ErrorBody {
            success: false,
            error: err.code(),
            message,
            reason: err.payout_reason(),
            retry_in_ms,
        };

        (status, Json(body)).into_response()
    }
}

/// Parse an optional JSON body; an empty body yields the default value
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError(FaucetError::BadRequest(format!("invalid JSON body: {e}"))))
}
