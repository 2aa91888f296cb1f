//! Reward-claim and withdrawal state machine.
//!
//! Both engines take the caller's identity as an explicit `Option`: the HTTP
//! layer resolves the session once per request and hands the result in.

mod claim;
mod withdraw;

pub use claim::ClaimEngine;
pub use withdraw::WithdrawalEngine;

use std::sync::Arc;

/// Source of the current time in epoch millis
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> Clock {
    Arc::new(faucet_common::now_millis)
}
