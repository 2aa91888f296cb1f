//! Withdrawal engine: session -> address -> balance -> payout -> zero -> persist.
//!
//! The balance is only zeroed after the provider confirms the send. The
//! identity's lock is held across the provider call so no claim or second
//! withdrawal for the same user can interleave with an in-flight payout.
//! Settlement runs on its own task, so a disconnecting client cannot cut it
//! off between a confirmed send and the balance reset.

use faucet_common::constants::{IDEMPOTENCY_CAPACITY, IDEMPOTENCY_TTL_SECS};
use faucet_common::{Amount, FaucetError, FaucetResult, Identity, InputField};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::payout::{PayoutProvider, PayoutReceipt, PayoutRequest};
use crate::store::{OnWriteFailure, UserStore};

#[derive(Clone)]
pub struct WithdrawalEngine {
    store: Arc<UserStore>,
    payout: Arc<dyn PayoutProvider>,
    currency: String,
    /// Confirmed receipts by (identity, idempotency key)
    receipts: Cache<(Identity, String), PayoutReceipt>,
}

impl WithdrawalEngine {
    pub fn new(store: Arc<UserStore>, payout: Arc<dyn PayoutProvider>, currency: String) -> Self {
        let receipts = Cache::builder()
            .max_capacity(IDEMPOTENCY_CAPACITY)
            .time_to_live(Duration::from_secs(IDEMPOTENCY_TTL_SECS))
            .build();

        Self {
            store,
            payout,
            currency,
            receipts,
        }
    }

    /// Send the caller's whole balance to `address`.
    ///
    /// With an `idempotency_key`, a repeat of an already confirmed request
    /// returns the original receipt instead of paying again.
    pub async fn withdraw(
        &self,
        identity: Option<&Identity>,
        address: &str,
        idempotency_key: Option<&str>,
    ) -> FaucetResult<PayoutReceipt> {
        let identity = identity.ok_or(FaucetError::Unauthenticated)?;

        let address = address.trim();
        if address.is_empty() {
            return Err(FaucetError::MissingInput(InputField::Address));
        }

        let replay_key = idempotency_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| (identity.clone(), k.to_string()));

        // Once a send may be in flight the settlement must run to completion,
        // even if the caller's request future is dropped.
        let engine = self.clone();
        let identity = identity.clone();
        let address = address.to_string();
        tokio::spawn(async move { engine.settle(identity, address, replay_key).await })
            .await
            .map_err(|e| {
                error!(error = %e, "Withdrawal task aborted");
                FaucetError::StoreIo(format!("withdrawal task aborted: {e}"))
            })?
    }

    /// Lock, replay or pay, zero and persist; owns all of its inputs so it
    /// can run detached from the request.
    async fn settle(
        &self,
        identity: Identity,
        address: String,
        replay_key: Option<(Identity, String)>,
    ) -> FaucetResult<PayoutReceipt> {
        let _guard = self.store.lock(&identity).await;

        if let Some(key) = &replay_key {
            if let Some(receipt) = self.receipts.get(key).await {
                info!(identity = %identity, idempotency_key = %key.1, "Replaying confirmed withdrawal");
                return Ok(receipt);
            }
        }

        let mut record = self
            .store
            .get(&identity)
            .await
            .ok_or(FaucetError::Unauthenticated)?;

        if record.balance.is_zero() {
            return Err(FaucetError::InsufficientBalance);
        }

        let request = PayoutRequest {
            to: address,
            amount: record.balance,
            currency: self.currency.clone(),
        };

        let receipt = match self.payout.send(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    identity = %identity,
                    to = %request.to,
                    amount = %request.amount,
                    error = %e,
                    "Payout failed, balance untouched"
                );
                return Err(e.into());
            }
        };

        record.balance = Amount::ZERO;
        let persisted = self
            .store
            .put(&identity, record, OnWriteFailure::KeepInMemory)
            .await;

        if let Some(key) = replay_key {
            self.receipts.insert(key, receipt.clone()).await;
        }

        if let Err(e) = persisted {
            error!(
                identity = %identity,
                to = %receipt.to,
                amount = %receipt.amount,
                payout_id = ?receipt.payout_id,
                "Payout confirmed but zeroed balance was not persisted"
            );
            return Err(e);
        }

        info!(
            identity = %identity,
            to = %receipt.to,
            amount = %receipt.amount,
            currency = %receipt.currency,
            payout_id = ?receipt.payout_id,
            "Withdrawal confirmed"
        );

        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout::PayoutError;
    use crate::test_utils::{MockPayout, temp_store};
    use async_trait::async_trait;
    use faucet_common::UserRecord;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_test::assert_ok;

    fn user() -> Identity {
        Identity::parse("a@x.com").unwrap()
    }

    async fn fund(store: &UserStore, units: u64) {
        store
            .put(
                &user(),
                UserRecord {
                    balance: Amount::from_units(units),
                    ..Default::default()
                },
                OnWriteFailure::Rollback,
            )
            .await
            .unwrap();
    }

    fn engine(store: Arc<UserStore>, payout: Arc<MockPayout>) -> WithdrawalEngine {
        WithdrawalEngine::new(store, payout, "BTC".to_string())
    }

    #[tokio::test]
    async fn test_requires_session_and_address() {
        let (_dir, store) = temp_store().await;
        let payout = MockPayout::confirming();
        let engine = engine(store, payout.clone());

        assert_eq!(
            engine.withdraw(None, "addr", None).await.unwrap_err(),
            FaucetError::Unauthenticated
        );
        assert_eq!(
            engine.withdraw(Some(&user()), "   ", None).await.unwrap_err(),
            FaucetError::MissingInput(InputField::Address)
        );
        assert_eq!(payout.call_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_balance_is_insufficient() {
        let (_dir, store) = temp_store().await;
        store.ensure(&user()).await.unwrap();
        let payout = MockPayout::confirming();
        let engine = engine(store.clone(), payout.clone());

        let err = engine.withdraw(Some(&user()), "addr", None).await.unwrap_err();
        assert_eq!(err, FaucetError::InsufficientBalance);
        assert_eq!(store.get(&user()).await.unwrap().balance, Amount::ZERO);
        assert_eq!(payout.call_count(), 0);
    }

    #[tokio::test]
    async fn test_confirmed_payout_zeroes_once() {
        let (_dir, store) = temp_store().await;
        fund(&store, 1_000).await;
        let payout = MockPayout::confirming();
        let engine = engine(store.clone(), payout.clone());

        let receipt = assert_ok!(engine.withdraw(Some(&user()), " wallet-1 ", None).await);
        assert_eq!(receipt.amount, Amount::from_units(1_000));
        assert_eq!(receipt.to, "wallet-1");
        assert_eq!(store.get(&user()).await.unwrap().balance, Amount::ZERO);

        let sent = payout.requests.lock().unwrap()[0].clone();
        assert_eq!(sent.amount, Amount::from_units(1_000));
        assert_eq!(sent.currency, "BTC");

        let again = engine.withdraw(Some(&user()), "wallet-1", None).await;
        assert_eq!(again.unwrap_err(), FaucetError::InsufficientBalance);
        assert_eq!(payout.call_count(), 1);
    }

    #[tokio::test]
    async fn test_rejected_payout_leaves_balance() {
        let (_dir, store) = temp_store().await;
        fund(&store, 2_500).await;
        let payout = MockPayout::failing(PayoutError::Rejected {
            status: 456,
            message: "Invalid address".into(),
        });
        let engine = engine(store.clone(), payout);

        let err = engine.withdraw(Some(&user()), "bad", None).await.unwrap_err();
        assert_eq!(err.code(), "PayoutFailed");
        assert_eq!(err.payout_reason(), Some("rejected"));
        assert_eq!(
            store.get(&user()).await.unwrap().balance,
            Amount::from_units(2_500)
        );
    }

    #[tokio::test]
    async fn test_unreachable_payout_leaves_balance() {
        let (_dir, store) = temp_store().await;
        fund(&store, 2_500).await;
        let payout = MockPayout::failing(PayoutError::Unreachable("timed out".into()));
        let engine = engine(store.clone(), payout.clone());

        let err = engine.withdraw(Some(&user()), "addr", None).await.unwrap_err();
        assert_eq!(err.payout_reason(), Some("unreachable"));
        assert_eq!(
            store.get(&user()).await.unwrap().balance,
            Amount::from_units(2_500)
        );

        // Provider recovers; the full balance is still available
        payout.set_outcome(Ok(()));
        let receipt = engine.withdraw(Some(&user()), "addr", None).await.unwrap();
        assert_eq!(receipt.amount, Amount::from_units(2_500));
    }

    #[tokio::test]
    async fn test_idempotency_key_replays_receipt() {
        let (_dir, store) = temp_store().await;
        fund(&store, 1_000).await;
        let payout = MockPayout::confirming();
        let engine = engine(store.clone(), payout.clone());

        let first = engine
            .withdraw(Some(&user()), "addr", Some("req-1"))
            .await
            .unwrap();
        let replay = engine
            .withdraw(Some(&user()), "addr", Some("req-1"))
            .await
            .unwrap();

        assert_eq!(first, replay);
        assert_eq!(payout.call_count(), 1);

        let fresh = engine.withdraw(Some(&user()), "addr", Some("req-2")).await;
        assert_eq!(fresh.unwrap_err(), FaucetError::InsufficientBalance);
    }

    #[tokio::test]
    async fn test_failed_payout_is_not_replayed() {
        let (_dir, store) = temp_store().await;
        fund(&store, 1_000).await;
        let payout = MockPayout::failing(PayoutError::Unreachable("reset".into()));
        let engine = engine(store.clone(), payout.clone());

        assert!(engine.withdraw(Some(&user()), "addr", Some("k")).await.is_err());

        payout.set_outcome(Ok(()));
        let receipt = engine.withdraw(Some(&user()), "addr", Some("k")).await.unwrap();
        assert_eq!(receipt.amount, Amount::from_units(1_000));
        assert_eq!(payout.call_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_pay_once() {
        let (_dir, store) = temp_store().await;
        fund(&store, 1_000).await;
        let payout = MockPayout::confirming();
        let engine = Arc::new(engine(store.clone(), payout.clone()));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = engine.clone();
            handles.push(tokio::spawn(async move {
                engine.withdraw(Some(&user()), "addr", None).await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(payout.call_count(), 1);
    }

    /// Counts the send immediately, confirms only after a delay
    struct DelayedConfirm {
        sends: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl PayoutProvider for DelayedConfirm {
        async fn send(&self, request: &PayoutRequest) -> Result<PayoutReceipt, PayoutError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(PayoutReceipt {
                to: request.to.clone(),
                amount: request.amount,
                currency: request.currency.clone(),
                payout_id: None,
            })
        }
    }

    #[tokio::test]
    async fn test_dropped_request_still_settles() {
        let (_dir, store) = temp_store().await;
        fund(&store, 1_000).await;
        let payout = Arc::new(DelayedConfirm {
            sends: AtomicUsize::new(0),
            delay: Duration::from_millis(200),
        });
        let engine = WithdrawalEngine::new(store.clone(), payout.clone(), "BTC".to_string());

        // Caller gives up while the provider is still confirming
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            engine.withdraw(Some(&user()), "addr", Some("k1")),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(payout.sends.load(Ordering::SeqCst), 1);

        let retry = assert_ok!(engine.withdraw(Some(&user()), "addr", Some("k1")).await);
        assert_eq!(retry.amount, Amount::from_units(1_000));
        assert_eq!(payout.sends.load(Ordering::SeqCst), 1);
        assert_eq!(store.get(&user()).await.unwrap().balance, Amount::ZERO);

        let fresh = engine.withdraw(Some(&user()), "addr", None).await;
        assert_eq!(fresh.unwrap_err(), FaucetError::InsufficientBalance);
        assert_eq!(payout.sends.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unpersisted_payout_stays_zeroed() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        let store = Arc::new(UserStore::open(nested.join("data.json")).await.unwrap());
        fund(&store, 1_000).await;
        let payout = MockPayout::confirming();
        let engine = engine(store.clone(), payout.clone());

        std::fs::remove_dir_all(&nested).unwrap();

        let err = engine
            .withdraw(Some(&user()), "addr", Some("k1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "StoreIOError");
        assert_eq!(payout.call_count(), 1);
        assert_eq!(store.get(&user()).await.unwrap().balance, Amount::ZERO);

        let again = engine.withdraw(Some(&user()), "addr", None).await;
        assert_eq!(again.unwrap_err(), FaucetError::InsufficientBalance);

        let replay = assert_ok!(engine.withdraw(Some(&user()), "addr", Some("k1")).await);
        assert_eq!(replay.amount, Amount::from_units(1_000));
        assert_eq!(payout.call_count(), 1);
    }
}
