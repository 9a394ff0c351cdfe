use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::identity::Credential;
use async_trait::async_trait;
use candid::Principal;
use std::fmt;
use std::sync::Arc;
use upkeep_types::{ApproveArgs, ApproveResult, RegisterResult};

/// Candid method name of the ICRC-2 approval.
pub const ICRC2_APPROVE_METHOD: &str = "icrc2_approve";

/// Authenticated access to the ledger canister.
#[async_trait]
pub trait LedgerHandle: Send + Sync {
    fn canister_id(&self) -> Principal;

    async fn icrc2_approve(&self, args: ApproveArgs) -> Result<ApproveResult, ClientError>;
}

/// Authenticated access to the contract canister.
#[async_trait]
pub trait ContractHandle: Send + Sync {
    fn canister_id(&self) -> Principal;

    async fn register(&self) -> Result<RegisterResult, ClientError>;
}

/// The handle pair created by one `connect`.
#[derive(Clone)]
pub struct Handles {
    pub contract: Arc<dyn ContractHandle>,
    pub ledger: Arc<dyn LedgerHandle>,
}

impl fmt::Debug for Handles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handles")
            .field("contract", &self.contract.canister_id().to_text())
            .field("ledger", &self.ledger.canister_id().to_text())
            .finish()
    }
}

/// Builds the handle pair for a signed-in identity.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credential: &Credential,
        config: &ClientConfig,
    ) -> Result<Handles, ClientError>;
}
