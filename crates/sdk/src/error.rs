use thiserror::Error;

/// Why a login did not produce a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoginError {
    #[error("login cancelled")]
    Cancelled,
    #[error("login failed: {0}")]
    Failed(String),
}

impl LoginError {
    pub fn failed(reason: impl Into<String>) -> Self {
        LoginError::Failed(reason.into())
    }
}

/// Errors surfaced by [`crate::RegistrationClient`] and the canister handles.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not connected: run connect first")]
    NotConnected,
    #[error("session expired: connect again")]
    SessionExpired,
    #[error("session idle for too long: connect again")]
    IdleTimeout,
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("agent error: {0}")]
    Agent(#[from] ic_agent::AgentError),
    #[error("candid error: {0}")]
    Candid(#[from] candid::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ClientError::Config(msg.into())
    }

    /// True when the session was dropped and `connect` must run again.
    pub fn requires_reconnect(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected | ClientError::SessionExpired | ClientError::IdleTimeout
        )
    }
}
