//! Persisted user store.
//!
//! The whole store lives in memory and is written back to a single JSON
//! snapshot on every mutation. The process owns the file exclusively, so the
//! in-memory map is authoritative once loaded.
//!
//! Concurrency discipline:
//! - `lock()` hands out a per-identity guard; engines hold it across their
//!   whole read-check-mutate-persist sequence.
//! - `writer` serializes snapshot writes so two identities never race on the
//!   file.

mod snapshot;

use snapshot::Snapshot;

use anyhow::Result;
use faucet_common::{FaucetError, FaucetResult, Identity, UserRecord};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// What to do with an in-memory change whose snapshot write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnWriteFailure {
    /// Discard the change; memory keeps matching the file
    Rollback,
    /// Keep the change in memory; the next successful write persists it
    KeepInMemory,
}

/// Guard serializing all store access for one identity
pub type IdentityGuard = OwnedMutexGuard<()>;

pub struct UserStore {
    path: PathBuf,
    users: RwLock<BTreeMap<Identity, UserRecord>>,
    writer: Mutex<()>,
    identity_locks: std::sync::Mutex<HashMap<Identity, Arc<Mutex<()>>>>,
}

impl UserStore {
    /// Open the snapshot at `path`, creating it if absent.
    /// Fails on a malformed snapshot.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let snapshot = snapshot::load_or_create(&path).await?;

        tracing::info!(
            path = %path.display(),
            users = snapshot.users.len(),
            "User store loaded"
        );

        Ok(Self {
            path,
            users: RwLock::new(snapshot.users),
            writer: Mutex::new(()),
            identity_locks: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire the per-identity lock
    pub async fn lock(&self, identity: &Identity) -> IdentityGuard {
        let lock = {
            let mut locks = self
                .identity_locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(identity.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn get(&self, identity: &Identity) -> Option<UserRecord> {
        self.users.read().await.get(identity).cloned()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Return the identity's record, creating and persisting a zero record
    /// if it has never been seen
    pub async fn ensure(&self, identity: &Identity) -> FaucetResult<UserRecord> {
        let _guard = self.lock(identity).await;

        if let Some(existing) = self.get(identity).await {
            return Ok(existing);
        }

        let record = UserRecord::default();
        self.put(identity, record.clone(), OnWriteFailure::Rollback)
            .await?;
        tracing::info!(identity = %identity, "New user record created");
        Ok(record)
    }

    /// Replace the identity's record and persist the whole store.
    ///
    /// Callers hold the identity's guard from `lock()`.
    pub async fn put(
        &self,
        identity: &Identity,
        record: UserRecord,
        on_failure: OnWriteFailure,
    ) -> FaucetResult<()> {
        let _writer = self.writer.lock().await;

        let mut staged = Snapshot {
            users: self.users.read().await.clone(),
        };
        staged.users.insert(identity.clone(), record.clone());

        match snapshot::write_atomic(&self.path, &staged).await {
            Ok(()) => {
                self.users.write().await.insert(identity.clone(), record);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    identity = %identity,
                    path = %self.path.display(),
                    error = %e,
                    on_failure = ?on_failure,
                    "Failed to persist user store"
                );
                if on_failure == OnWriteFailure::KeepInMemory {
                    self.users.write().await.insert(identity.clone(), record);
                }
                Err(FaucetError::StoreIo(e.to_string()))
            }
        }
    }

    /// True if the snapshot file can currently be written
    pub async fn is_writable(&self) -> bool {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => !meta.permissions().readonly(),
            Err(_) => false,
        }
    }
}
