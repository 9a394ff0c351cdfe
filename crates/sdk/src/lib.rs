//! Registration client for the upkeep contract canister.
//!
//! [`RegistrationClient`] drives the three-step flow: log in and build the
//! canister handles ([`RegistrationClient::connect`]), approve the
//! registration fee on the ledger
//! ([`RegistrationClient::approve_registration_cost`]), then call `register`
//! on the contract ([`RegistrationClient::register`]).

mod agent;
mod client;
mod config;
mod error;
mod handles;
mod identity;
mod session;

pub use crate::agent::{AgentConnector, AgentContract, AgentLedger};
pub use crate::client::RegistrationClient;
pub use crate::config::{
    ClientConfig, Network, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_TIME_TO_LIVE, IC_HOST,
    IC_IDENTITY_PROVIDER, LOCAL_HOST, MAX_TIME_TO_LIVE_LIMIT,
};
pub use crate::error::{ClientError, LoginError};
pub use crate::handles::{Connector, ContractHandle, Handles, LedgerHandle, ICRC2_APPROVE_METHOD};
pub use crate::identity::{Credential, IdentityProvider, LoginRequest};
pub use upkeep_types::*;
