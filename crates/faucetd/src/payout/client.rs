//! JSON payout API client (FaucetPay-style `send` endpoint).

use anyhow::{Context, Result};
use async_trait::async_trait;
use faucet_common::constants::PAYOUT_SUCCESS_STATUS;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::{PayoutError, PayoutProvider, PayoutReceipt, PayoutRequest};

#[derive(Serialize)]
struct SendBody<'a> {
    api_key: &'a str,
    to: &'a str,
    amount: f64,
    currency: &'a str,
}

pub struct HttpPayoutClient {
    client: reqwest::Client,
    send_url: String,
    api_key: String,
}

impl HttpPayoutClient {
    pub fn new(send_url: String, api_key: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build payout HTTP client")?;

        Ok(Self {
            client,
            send_url,
            api_key,
        })
    }
}

#[async_trait]
impl PayoutProvider for HttpPayoutClient {
    async fn send(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        let body = SendBody {
            api_key: &self.api_key,
            to: &request.to,
            amount: request.amount.to_decimal(),
            currency: &request.currency,
        };

        let response = self
            .client
            .post(&self.send_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| PayoutError::Unreachable(format!("request failed: {e}")))?;

        let http_status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PayoutError::Unreachable(format!("failed to read response: {e}")))?;

        interpret_response(http_status, &text, request)
    }
}

/// Decide whether a provider answer confirms the send.
///
/// Only a JSON body whose `status` equals 200 confirms. A JSON body with any
/// other status is a rejection. A body that cannot be read as such is a
/// rejection on HTTP 4xx and unreachable otherwise, since nothing was
/// confirmed either way.
fn interpret_response(
    http_status: reqwest::StatusCode,
    text: &str,
    request: &PayoutRequest,
) -> Result<PayoutReceipt, PayoutError> {
    let json: Option<Value> = serde_json::from_str(text).ok();
    let status = json.as_ref().and_then(|v| v.get("status")).and_then(status_code);

    let Some(status) = status else {
        let snippet: String = text.chars().take(200).collect();
        return if http_status.is_client_error() {
            Err(PayoutError::Rejected {
                status: i64::from(http_status.as_u16()),
                message: snippet,
            })
        } else {
            Err(PayoutError::Unreachable(format!(
                "unrecognized response (HTTP {http_status}): {snippet}"
            )))
        };
    };

    let message = json
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if status != PAYOUT_SUCCESS_STATUS {
        return Err(PayoutError::Rejected { status, message });
    }

    let payout_id = json
        .as_ref()
        .and_then(|v| v.get("payout_id"))
        .and_then(|id| match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    Ok(PayoutReceipt {
        to: request.to.clone(),
        amount: request.amount,
        currency: request.currency.clone(),
        payout_id,
    })
}

/// Providers report the status as either a number or a numeric string
fn status_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
