//! Test doubles and helpers shared by unit tests.

use async_trait::async_trait;
use axum::Router;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

use crate::captcha::CaptchaVerifier;
use crate::payout::{PayoutError, PayoutProvider, PayoutReceipt, PayoutRequest};
use crate::store::UserStore;

/// Serve `router` on an ephemeral local port
pub async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// A local address with nothing listening on it
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Open a store backed by a fresh temp directory
pub async fn temp_store() -> (TempDir, Arc<UserStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = UserStore::open(dir.path().join("data.json")).await.unwrap();
    (dir, Arc::new(store))
}

/// Accepts exactly one token value
pub struct MockCaptcha {
    pub accepted: String,
    pub calls: AtomicUsize,
}

impl MockCaptcha {
    pub fn accepting(token: &str) -> Arc<Self> {
        Arc::new(Self {
            accepted: token.to_string(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CaptchaVerifier for MockCaptcha {
    async fn verify(&self, token: &str, _remote_ip: Option<IpAddr>) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        token == self.accepted
    }
}

/// Payout provider with a scripted answer that records every request
pub struct MockPayout {
    outcome: Mutex<Result<(), PayoutError>>,
    pub requests: Mutex<Vec<PayoutRequest>>,
}

impl MockPayout {
    pub fn confirming() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(Ok(())),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(err: PayoutError) -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(Err(err)),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn set_outcome(&self, outcome: Result<(), PayoutError>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PayoutProvider for MockPayout {
    async fn send(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
        self.requests.lock().unwrap().push(request.clone());
        let outcome = self.outcome.lock().unwrap().clone();
        outcome.map(|()| PayoutReceipt {
            to: request.to.clone(),
            amount: request.amount,
            currency: request.currency.clone(),
            payout_id: Some(format!("mock-{}", self.call_count())),
        })
    }
}
