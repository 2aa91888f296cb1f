//! # Faucet Common
//!
//! Shared types, error taxonomy, and constants used by the faucet service.
//!
//! ## Modules
//! - `types` - Core data structures (Amount, ClaimKind, UserRecord, cooldown policy)
//! - `error` - Request-level error taxonomy
//! - `constants` - Reward amounts, cooldown intervals, and defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{FaucetError, FaucetResult, InputField};
pub use types::*;
