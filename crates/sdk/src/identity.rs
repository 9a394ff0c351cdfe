use crate::error::LoginError;
use async_trait::async_trait;
use candid::Principal;
use ic_agent::Identity;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Parameters handed to the identity provider for one login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    /// Authorize URL of the identity provider.
    pub identity_provider: String,
    /// Upper bound on how long the resulting credential may be used.
    pub max_time_to_live: Duration,
}

/// Signed-in identity returned by a successful login.
#[derive(Clone)]
pub struct Credential {
    identity: Arc<dyn Identity>,
    principal: Principal,
    issuer: String,
    expires_at: SystemTime,
}

impl Credential {
    pub fn new(
        identity: Arc<dyn Identity>,
        principal: Principal,
        issuer: impl Into<String>,
        expires_at: SystemTime,
    ) -> Self {
        Self {
            identity,
            principal,
            issuer: issuer.into(),
            expires_at,
        }
    }

    /// Credential for `identity`, valid for the requested time to live.
    pub fn for_request(identity: Arc<dyn Identity>, request: &LoginRequest) -> Result<Self, LoginError> {
        let principal = identity.sender().map_err(LoginError::Failed)?;
        let expires_at = SystemTime::now()
            .checked_add(request.max_time_to_live)
            .ok_or_else(|| LoginError::failed("time to live is out of range"))?;
        Ok(Self::new(
            identity,
            principal,
            request.identity_provider.clone(),
            expires_at,
        ))
    }

    pub fn identity(&self) -> Arc<dyn Identity> {
        Arc::clone(&self.identity)
    }

    pub fn principal(&self) -> Principal {
        self.principal
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }

    /// Time left before the credential expires, zero once it has.
    pub fn remaining(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal.to_text())
            .field("issuer", &self.issuer)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Interactive login flow producing a [`Credential`].
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<Credential, LoginError>;
}
