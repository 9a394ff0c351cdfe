//! Registration canister interface.
//!
//! ```text
//! type Errors = variant { Insufficient_Funds };
//! type Result = variant { ok : record {}; err : Errors };
//! service : { register : () -> (Result) };
//! ```

use candid::CandidType;
use serde::Deserialize;
use std::fmt;

/// Candid method name of the registration call.
pub const REGISTER_METHOD: &str = "register";

/// `record {}`
#[derive(CandidType, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty {}

/// Failures declared by the contract canister.
#[derive(CandidType, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterError {
    /// The caller's approved allowance does not cover the registration fee.
    #[serde(rename = "Insufficient_Funds")]
    InsufficientFunds,
}

/// Raw reply of `register`.
#[derive(CandidType, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterResult {
    #[serde(rename = "ok")]
    Ok(Empty),
    #[serde(rename = "err")]
    Err(RegisterError),
}

/// The two outcomes a registration can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Registered,
    InsufficientFunds,
}

impl RegistrationOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationOutcome::Registered)
    }
}

impl From<RegisterResult> for RegistrationOutcome {
    fn from(value: RegisterResult) -> Self {
        match value {
            RegisterResult::Ok(Empty {}) => RegistrationOutcome::Registered,
            RegisterResult::Err(RegisterError::InsufficientFunds) => {
                RegistrationOutcome::InsufficientFunds
            }
        }
    }
}

impl fmt::Display for RegistrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistrationOutcome::Registered => write!(f, "registered"),
            RegistrationOutcome::InsufficientFunds => {
                write!(f, "insufficient funds: approve the registration fee first")
            }
        }
    }
}
