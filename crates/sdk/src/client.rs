use crate::agent::AgentConnector;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::handles::{Connector, Handles};
use crate::identity::{IdentityProvider, LoginRequest};
use crate::session::Session;
use candid::Principal;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};
use upkeep_types::{Account, ApproveArgs, ApproveResult, RegistrationOutcome};

/// Logs in, approves the registration fee and registers with the contract.
///
/// The three operations may be invoked in any order; `approve_registration_cost`
/// and `register` fail with [`ClientError::NotConnected`] until `connect` has
/// succeeded. The session lock is never held across a remote call, so
/// operations may overlap.
pub struct RegistrationClient {
    config: ClientConfig,
    identity_provider: Arc<dyn IdentityProvider>,
    connector: Arc<dyn Connector>,
    session: Mutex<Session>,
}

impl RegistrationClient {
    pub fn new(
        config: ClientConfig,
        identity_provider: Arc<dyn IdentityProvider>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        Ok(Self {
            config,
            identity_provider,
            connector,
            session: Mutex::new(Session::Disconnected),
        })
    }

    /// Client talking to real canisters through `ic-agent`.
    pub fn with_agent(
        config: ClientConfig,
        identity_provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self, ClientError> {
        Self::new(config, identity_provider, Arc::new(AgentConnector))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.session.lock(), Session::Connected(_))
    }

    /// Principal of the signed-in identity, if connected.
    pub fn principal(&self) -> Option<Principal> {
        self.session.lock().principal()
    }

    /// Runs the login flow and binds fresh ledger and contract handles to the
    /// resulting identity. A previous session is replaced.
    pub async fn connect(&self) -> Result<Principal, ClientError> {
        let request = LoginRequest {
            identity_provider: self.config.identity_provider_url()?,
            max_time_to_live: self.config.max_time_to_live,
        };
        info!(
            network = %self.config.network,
            provider = %request.identity_provider,
            "starting login"
        );

        let credential = self.identity_provider.login(&request).await?;
        let principal = credential.principal();
        let ttl = credential.remaining().min(self.config.max_time_to_live);
        if ttl.is_zero() {
            warn!(%principal, "login returned an expired credential");
            *self.session.lock() = Session::Disconnected;
            return Err(ClientError::SessionExpired);
        }

        let handles = self.connector.connect(&credential, &self.config).await?;
        let contract = handles.contract.canister_id();
        let ledger = handles.ledger.canister_id();
        let session = Session::connected(handles, principal, ttl)?;
        info!(
            %principal,
            %contract,
            %ledger,
            ttl_secs = ttl.as_secs(),
            "connected"
        );
        *self.session.lock() = session;
        Ok(principal)
    }

    /// Drops both handles.
    pub fn disconnect(&self) {
        let previous = std::mem::take(&mut *self.session.lock());
        if let Some(principal) = previous.principal() {
            info!(%principal, "disconnected");
        }
    }

    /// Approves the spender to withdraw exactly the configured registration
    /// fee from the caller's ledger account. The ledger's reply is logged and
    /// returned as is.
    pub async fn approve_registration_cost(&self) -> Result<ApproveResult, ClientError> {
        let handles = self.handles()?;
        let args = ApproveArgs::new(
            Account::of(self.config.spender()),
            self.config.registration_fee,
        );
        info!(
            amount = %self.config.registration_fee,
            spender = %args.spender,
            "approving registration cost"
        );

        let result = handles.ledger.icrc2_approve(args).await?;
        info!(response = ?result, "icrc2_approve");
        Ok(result)
    }

    /// Calls `register` on the contract canister.
    pub async fn register(&self) -> Result<RegistrationOutcome, ClientError> {
        let handles = self.handles()?;
        let reply = handles.contract.register().await?;
        info!(response = ?reply, "register");

        let outcome = RegistrationOutcome::from(reply);
        if !outcome.is_registered() {
            warn!(%outcome, "registration not recorded");
        }
        Ok(outcome)
    }

    fn handles(&self) -> Result<Handles, ClientError> {
        let mut session = self.session.lock();
        let result = session.acquire(Instant::now(), self.config.idle_limit());
        if let Err(err) = &result {
            if !matches!(err, ClientError::NotConnected) {
                warn!(error = %err, "session dropped");
            }
        }
        result
    }
}
