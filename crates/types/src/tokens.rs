//! ICP token amounts in e8s.
//!
//! | Name | Value in ICP | e8s          |
//! |------|--------------|--------------|
//! | ICP  | 1.0          | 10⁸          |
//! | e8s  | 10⁻⁸         | 1            |
//!
//! Amounts are kept as integers end to end; the decimal form is only used
//! for display and for parsing human input.

use candid::Nat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of decimal places in one ICP.
pub const ICP_DECIMALS: u32 = 8;

/// One full ICP in e8s.
pub const E8S_PER_ICP: u64 = 10u64.pow(ICP_DECIMALS);

/// Flat transfer fee charged by the ICP ledger.
pub const LEDGER_TRANSFER_FEE: Tokens = Tokens::from_e8s(10_000);

/// Registration cost charged by the contract canister.
pub const REGISTRATION_COST: Tokens = Tokens::from_e8s(50_000_000);

/// Allowance approved before registering: the registration cost plus the
/// ledger fee the contract pays when it pulls the funds.
pub const REGISTRATION_FEE: Tokens = Tokens::from_e8s(50_010_000);

/// An amount of ICP in e8s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tokens(u64);

impl Tokens {
    pub const fn from_e8s(e8s: u64) -> Self {
        Self(e8s)
    }

    pub const fn from_icp(icp: u64) -> Self {
        Self(icp * E8S_PER_ICP)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub const fn e8s(&self) -> u64 {
        self.0
    }

    pub fn checked_add(&self, other: Tokens) -> Option<Tokens> {
        self.0.checked_add(other.0).map(Tokens)
    }

    pub fn checked_sub(&self, other: Tokens) -> Option<Tokens> {
        self.0.checked_sub(other.0).map(Tokens)
    }

    /// Ledger `nat` representation.
    pub fn to_nat(&self) -> Nat {
        Nat::from(self.0)
    }
}

impl Default for Tokens {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for Tokens {
    fn from(e8s: u64) -> Self {
        Self(e8s)
    }
}

impl From<Tokens> for Nat {
    fn from(value: Tokens) -> Self {
        value.to_nat()
    }
}

impl fmt::Display for Tokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / E8S_PER_ICP;
        let fractional = self.0 % E8S_PER_ICP;
        write!(f, "{whole}.{fractional:08} ICP")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokensParseError {
    #[error("empty amount")]
    Empty,
    #[error("invalid amount `{0}`")]
    Invalid(String),
    #[error("too many decimal places in `{0}` (max {ICP_DECIMALS})")]
    TooPrecise(String),
    #[error("amount `{0}` overflows")]
    Overflow(String),
}

/// Parses either a plain e8s integer (`50010000`, `50_010_000`) or a decimal
/// ICP amount with an explicit unit (`0.5001 ICP`).
impl FromStr for Tokens {
    type Err = TokensParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(TokensParseError::Empty);
        }

        let Some(icp) = trimmed
            .strip_suffix("ICP")
            .or_else(|| trimmed.strip_suffix("icp"))
        else {
            let digits = trimmed.replace('_', "");
            if digits.is_empty() || !is_digits(&digits) {
                return Err(TokensParseError::Invalid(s.to_string()));
            }
            return digits
                .parse::<u64>()
                .map(Tokens)
                .map_err(|_| TokensParseError::Invalid(s.to_string()));
        };

        let icp = icp.trim();
        let (whole, fractional) = match icp.split_once('.') {
            Some((whole, fractional)) => (whole, fractional),
            None => (icp, ""),
        };
        let malformed = (whole.is_empty() && fractional.is_empty())
            || !is_digits(whole)
            || !is_digits(fractional);
        if malformed {
            return Err(TokensParseError::Invalid(s.to_string()));
        }
        if fractional.len() > ICP_DECIMALS as usize {
            return Err(TokensParseError::TooPrecise(s.to_string()));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole
                .parse()
                .map_err(|_| TokensParseError::Invalid(s.to_string()))?
        };
        let fractional: u64 = if fractional.is_empty() {
            0
        } else {
            let padded = format!("{fractional:0<8}");
            padded
                .parse()
                .map_err(|_| TokensParseError::Invalid(s.to_string()))?
        };

        whole
            .checked_mul(E8S_PER_ICP)
            .and_then(|e8s| e8s.checked_add(fractional))
            .map(Tokens)
            .ok_or_else(|| TokensParseError::Overflow(s.to_string()))
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
