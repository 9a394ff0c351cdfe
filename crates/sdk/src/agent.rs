//! Handles backed by an `ic-agent` [`Agent`].

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::handles::{Connector, ContractHandle, Handles, LedgerHandle, ICRC2_APPROVE_METHOD};
use crate::identity::Credential;
use async_trait::async_trait;
use candid::{Decode, Encode, Principal};
use ic_agent::Agent;
use std::sync::Arc;
use tracing::debug;
use upkeep_types::{ApproveArgs, ApproveResult, RegisterResult, REGISTER_METHOD};

/// Creates one agent per login and binds both handles to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentConnector;

#[async_trait]
impl Connector for AgentConnector {
    async fn connect(
        &self,
        credential: &Credential,
        config: &ClientConfig,
    ) -> Result<Handles, ClientError> {
        let agent = Agent::builder()
            .with_url(config.host())
            .with_arc_identity(credential.identity())
            .build()?;

        // A local replica signs with a throwaway root key.
        if config.network.is_local() {
            debug!(host = config.host(), "fetching root key");
            agent.fetch_root_key().await?;
        }

        Ok(Handles {
            contract: Arc::new(AgentContract::new(
                agent.clone(),
                config.contract_canister_id,
            )),
            ledger: Arc::new(AgentLedger::new(agent, config.ledger_canister_id)),
        })
    }
}

/// Ledger canister reached through an agent.
#[derive(Clone)]
pub struct AgentLedger {
    agent: Agent,
    canister_id: Principal,
}

impl AgentLedger {
    pub fn new(agent: Agent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }
}

#[async_trait]
impl LedgerHandle for AgentLedger {
    fn canister_id(&self) -> Principal {
        self.canister_id
    }

    async fn icrc2_approve(&self, args: ApproveArgs) -> Result<ApproveResult, ClientError> {
        let arg = Encode!(&args)?;
        let reply = self
            .agent
            .update(&self.canister_id, ICRC2_APPROVE_METHOD)
            .with_arg(arg)
            .call_and_wait()
            .await?;
        Ok(Decode!(&reply, ApproveResult)?)
    }
}

/// Contract canister reached through an agent.
#[derive(Clone)]
pub struct AgentContract {
    agent: Agent,
    canister_id: Principal,
}

impl AgentContract {
    pub fn new(agent: Agent, canister_id: Principal) -> Self {
        Self { agent, canister_id }
    }
}

#[async_trait]
impl ContractHandle for AgentContract {
    fn canister_id(&self) -> Principal {
        self.canister_id
    }

    async fn register(&self) -> Result<RegisterResult, ClientError> {
        let reply = self
            .agent
            .update(&self.canister_id, REGISTER_METHOD)
            .with_arg(Encode!()?)
            .call_and_wait()
            .await?;
        Ok(Decode!(&reply, RegisterResult)?)
    }
}
