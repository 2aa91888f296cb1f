//! Siteverify client (hCaptcha / reCAPTCHA / Turnstile compatible).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

use super::CaptchaVerifier;

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
    #[serde(default, rename = "error-codes")]
    error_codes: Vec<String>,
}

/// Verifies tokens by POSTing `{secret, response, remoteip}` to the provider
pub struct SiteVerifyClient {
    client: reqwest::Client,
    verify_url: String,
    secret: String,
}

impl SiteVerifyClient {
    pub fn new(verify_url: String, secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build CAPTCHA HTTP client")?;

        Ok(Self {
            client,
            verify_url,
            secret,
        })
    }

    async fn siteverify(
        &self,
        token: &str,
        remote_ip: Option<IpAddr>,
    ) -> reqwest::Result<SiteVerifyResponse> {
        let mut form = vec![("secret", self.secret.clone()), ("response", token.to_string())];
        if let Some(ip) = remote_ip {
            form.push(("remoteip", ip.to_string()));
        }

        self.client
            .post(&self.verify_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

#[async_trait]
impl CaptchaVerifier for SiteVerifyClient {
    async fn verify(&self, token: &str, remote_ip: Option<IpAddr>) -> bool {
        match self.siteverify(token, remote_ip).await {
            Ok(response) if response.success => {
                tracing::debug!(remote_ip = ?remote_ip, "CAPTCHA verified");
                true
            }
            Ok(response) => {
                tracing::debug!(
                    remote_ip = ?remote_ip,
                    error_codes = ?response.error_codes,
                    "CAPTCHA rejected by provider"
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    url = %self.verify_url,
                    timeout = e.is_timeout(),
                    error = %e,
                    "CAPTCHA provider call failed, denying claim"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{spawn_mock, unused_addr};
    use axum::{Form, Json, Router, routing::post};
    use std::collections::HashMap;

    fn mock_provider() -> Router {
        Router::new().route(
            "/siteverify",
            post(|Form(form): Form<HashMap<String, String>>| async move {
                let ok = form.get("secret").map(String::as_str) == Some("s3cret")
                    && form.get("response").map(String::as_str) == Some("good-token")
                    && form.get("remoteip").map(String::as_str) == Some("10.0.0.1");
                if ok {
                    Json(serde_json::json!({ "success": true }))
                } else {
                    Json(serde_json::json!({
                        "success": false,
                        "error-codes": ["invalid-input-response"]
                    }))
                }
            }),
        )
    }

    fn client(url: String, timeout_ms: u64) -> SiteVerifyClient {
        SiteVerifyClient::new(url, "s3cret".into(), Duration::from_millis(timeout_ms)).unwrap()
    }

    fn ip() -> Option<IpAddr> {
        Some("10.0.0.1".parse().unwrap())
    }

    #[tokio::test]
    async fn test_valid_token_passes() {
        let addr = spawn_mock(mock_provider()).await;
        let verifier = client(format!("http://{addr}/siteverify"), 2_000);

        assert!(verifier.verify("good-token", ip()).await);
    }

    #[tokio::test]
    async fn test_invalid_token_fails() {
        let addr = spawn_mock(mock_provider()).await;
        let verifier = client(format!("http://{addr}/siteverify"), 2_000);

        assert!(!verifier.verify("bad-token", ip()).await);
    }

    #[tokio::test]
    async fn test_unreachable_provider_fails_closed() {
        let addr = unused_addr().await;
        let verifier = client(format!("http://{addr}/siteverify"), 500);

        assert!(!verifier.verify("good-token", ip()).await);
    }

    #[tokio::test]
    async fn test_garbage_response_fails_closed() {
        let router = Router::new().route("/siteverify", post(|| async { "<html>oops</html>" }));
        let addr = spawn_mock(router).await;
        let verifier = client(format!("http://{addr}/siteverify"), 2_000);

        assert!(!verifier.verify("good-token", ip()).await);
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let router = Router::new().route(
            "/siteverify",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(serde_json::json!({ "success": true }))
            }),
        );
        let addr = spawn_mock(router).await;
        let verifier = client(format!("http://{addr}/siteverify"), 100);

        assert!(!verifier.verify("good-token", ip()).await);
    }
}
