use crate::error::ClientError;
use candid::Principal;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use upkeep_types::{Tokens, REGISTRATION_FEE};
use url::Url;

/// Replica reached by a local `dfx start`.
pub const LOCAL_HOST: &str = "http://127.0.0.1:4943";
/// Public boundary nodes of the Internet Computer.
pub const IC_HOST: &str = "https://icp-api.io";
/// Production Internet Identity authorize endpoint.
pub const IC_IDENTITY_PROVIDER: &str = "https://identity.ic0.app/#authorize";

/// How long a login stays valid: 7 days.
pub const DEFAULT_MAX_TIME_TO_LIVE: Duration = Duration::from_secs(7 * 24 * 60 * 60);
/// Longest login the client accepts: 30 days.
pub const MAX_TIME_TO_LIVE_LIMIT: Duration = Duration::from_secs(30 * 24 * 60 * 60);
/// Inactivity after which the session is dropped: 100 minutes.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(6_000_000);

/// Network the canisters are deployed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Network {
    #[default]
    Local,
    Ic,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Local => "local",
            Network::Ic => "ic",
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Network::Local)
    }

    pub fn default_host(&self) -> &'static str {
        match self {
            Network::Local => LOCAL_HOST,
            Network::Ic => IC_HOST,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Network::Local),
            "ic" | "mainnet" => Ok(Network::Ic),
            other => Err(ClientError::config(format!(
                "unknown network `{other}` (expected `local` or `ic`)"
            ))),
        }
    }
}

/// Everything the client needs to reach the identity provider, the ledger and
/// the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub network: Network,
    /// Replica URL; `None` picks the network default.
    pub host: Option<String>,
    pub contract_canister_id: Principal,
    pub ledger_canister_id: Principal,
    /// Internet Identity canister, only consulted on the local network.
    pub identity_canister_id: Option<Principal>,
    /// Account allowed to pull the fee; `None` means the contract canister.
    pub spender: Option<Principal>,
    pub registration_fee: Tokens,
    pub max_time_to_live: Duration,
    pub idle_timeout: Duration,
    pub disable_idle: bool,
}

impl ClientConfig {
    pub fn new(
        network: Network,
        contract_canister_id: Principal,
        ledger_canister_id: Principal,
    ) -> Self {
        Self {
            network,
            host: None,
            contract_canister_id,
            ledger_canister_id,
            identity_canister_id: None,
            spender: None,
            registration_fee: REGISTRATION_FEE,
            max_time_to_live: DEFAULT_MAX_TIME_TO_LIVE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            disable_idle: false,
        }
    }

    pub fn with_identity_canister(mut self, id: impl Into<Option<Principal>>) -> Self {
        self.identity_canister_id = id.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<Option<String>>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_spender(mut self, spender: impl Into<Option<Principal>>) -> Self {
        self.spender = spender.into();
        self
    }

    pub fn host(&self) -> &str {
        self.host
            .as_deref()
            .unwrap_or_else(|| self.network.default_host())
    }

    pub fn spender(&self) -> Principal {
        self.spender.unwrap_or(self.contract_canister_id)
    }

    /// Inactivity limit, or `None` when idle detection is disabled.
    pub fn idle_limit(&self) -> Option<Duration> {
        (!self.disable_idle).then_some(self.idle_timeout)
    }

    /// Where the interactive login is sent.
    pub fn identity_provider_url(&self) -> Result<String, ClientError> {
        match self.network {
            Network::Ic => Ok(IC_IDENTITY_PROVIDER.to_string()),
            Network::Local => {
                let id = self.identity_canister_id.ok_or_else(|| {
                    ClientError::config("local network requires the Internet Identity canister id")
                })?;
                Ok(format!("http://localhost:4943?canisterId={id}#authorize"))
            }
        }
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        Url::parse(self.host())
            .map_err(|err| ClientError::config(format!("invalid host `{}`: {err}", self.host())))?;
        self.identity_provider_url()?;
        if self.registration_fee.is_zero() {
            return Err(ClientError::config("registration fee must be non-zero"));
        }
        if self.max_time_to_live.is_zero() {
            return Err(ClientError::config("max time to live must be non-zero"));
        }
        if self.max_time_to_live > MAX_TIME_TO_LIVE_LIMIT {
            return Err(ClientError::config(format!(
                "max time to live must be at most {} seconds",
                MAX_TIME_TO_LIVE_LIMIT.as_secs()
            )));
        }
        if !self.disable_idle && self.idle_timeout.is_zero() {
            return Err(ClientError::config(
                "idle timeout must be non-zero unless idle detection is disabled",
            ));
        }
        Ok(())
    }
}
