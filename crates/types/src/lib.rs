//! Wire types shared by the upkeep registration client.
//!
//! The ledger types follow the ICRC-2 `icrc2_approve` interface; the contract
//! types mirror the registration canister's `register : () -> (Result)`.

pub mod contract;
pub mod ledger;
pub mod tokens;

pub use contract::*;
pub use ledger::*;
pub use tokens::*;

/// Re-export so dependants name the same principal type as the wire structs.
pub use candid::{Nat, Principal};
