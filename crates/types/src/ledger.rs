//! ICRC-2 allowance approval types.

use crate::tokens::Tokens;
use candid::{CandidType, Nat, Principal};
use serde::Deserialize;
use serde_bytes::ByteBuf;
use std::fmt;

/// 32-byte ledger subaccount, encoded as a Candid `blob`.
pub type Subaccount = ByteBuf;

/// Ledger account: an owner principal and an optional subaccount.
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub owner: Principal,
    pub subaccount: Option<Subaccount>,
}

impl Account {
    /// Default subaccount of `owner`.
    pub fn of(owner: Principal) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.subaccount {
            Some(sub) => write!(f, "{}.{}", self.owner, hex::encode(sub)),
            None => write!(f, "{}", self.owner),
        }
    }
}

/// Argument of `icrc2_approve`.
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApproveArgs {
    pub fee: Option<Nat>,
    pub memo: Option<ByteBuf>,
    pub from_subaccount: Option<Subaccount>,
    pub created_at_time: Option<u64>,
    pub amount: Nat,
    pub expected_allowance: Option<Nat>,
    pub expires_at: Option<u64>,
    pub spender: Account,
}

impl ApproveArgs {
    /// Approve `spender` to pull up to `amount` from the caller's default
    /// subaccount, leaving fee, memo, timestamps and expected allowance to the
    /// ledger's defaults.
    pub fn new(spender: Account, amount: Tokens) -> Self {
        Self {
            fee: None,
            memo: None,
            from_subaccount: None,
            created_at_time: None,
            amount: amount.to_nat(),
            expected_allowance: None,
            expires_at: None,
            spender,
        }
    }
}

/// Rejection reasons declared by the ICRC-2 standard.
#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum ApproveError {
    BadFee { expected_fee: Nat },
    InsufficientFunds { balance: Nat },
    AllowanceChanged { current_allowance: Nat },
    Expired { ledger_time: u64 },
    TooOld,
    CreatedInFuture { ledger_time: u64 },
    Duplicate { duplicate_of: Nat },
    TemporarilyUnavailable,
    GenericError { error_code: Nat, message: String },
}

impl fmt::Display for ApproveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApproveError::BadFee { expected_fee } => {
                write!(f, "bad fee (expected {expected_fee})")
            }
            ApproveError::InsufficientFunds { balance } => {
                write!(f, "insufficient funds (balance {balance})")
            }
            ApproveError::AllowanceChanged { current_allowance } => {
                write!(f, "allowance changed (current {current_allowance})")
            }
            ApproveError::Expired { ledger_time } => {
                write!(f, "approval expired (ledger time {ledger_time})")
            }
            ApproveError::TooOld => write!(f, "transaction too old"),
            ApproveError::CreatedInFuture { ledger_time } => {
                write!(f, "created in the future (ledger time {ledger_time})")
            }
            ApproveError::Duplicate { duplicate_of } => {
                write!(f, "duplicate of block {duplicate_of}")
            }
            ApproveError::TemporarilyUnavailable => write!(f, "ledger temporarily unavailable"),
            ApproveError::GenericError {
                error_code,
                message,
            } => write!(f, "ledger error {error_code}: {message}"),
        }
    }
}

/// Reply of `icrc2_approve`: the block index of the approval, or the reason
/// it was rejected. Candid labels are `Ok` / `Err`.
pub type ApproveResult = Result<Nat, ApproveError>;
