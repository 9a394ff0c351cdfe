//! Registers the identity stored in a dfx PEM file.
//!
//! ```text
//! UPKEEP_PEM=~/.config/dfx/identity/default/identity.pem \
//! CANISTER_ID=bkyz2-fmaaa-aaaaa-qaaaq-cai \
//! CANISTER_ID_ICP_LEDGER_CANISTER=ryjl3-tyaaa-aaaaa-aaaba-cai \
//! CANISTER_ID_INTERNET_IDENTITY=rdmx6-jaaaa-aaaaa-aaadq-cai \
//! cargo run -p upkeep-sdk --example register_with_pem
//! ```

use async_trait::async_trait;
use ic_agent::identity::BasicIdentity;
use std::sync::Arc;
use upkeep_sdk::{
    ClientConfig, Credential, IdentityProvider, LoginError, LoginRequest, Network, Principal,
    RegistrationClient,
};

struct PemFile(String);

#[async_trait]
impl IdentityProvider for PemFile {
    async fn login(&self, request: &LoginRequest) -> Result<Credential, LoginError> {
        let identity =
            BasicIdentity::from_pem_file(&self.0).map_err(|e| LoginError::failed(e.to_string()))?;
        Credential::for_request(Arc::new(identity), request)
    }
}

fn canister(var: &str) -> Result<Principal, Box<dyn std::error::Error>> {
    let text = std::env::var(var).map_err(|_| format!("set {var} before running the example"))?;
    Ok(Principal::from_text(text)?)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let pem = std::env::var("UPKEEP_PEM").map_err(|_| "set UPKEEP_PEM to a dfx identity.pem")?;
    let network = std::env::var("DFX_NETWORK")
        .unwrap_or_else(|_| "local".to_string())
        .parse::<Network>()?;

    let config = ClientConfig::new(
        network,
        canister("CANISTER_ID")?,
        canister("CANISTER_ID_ICP_LEDGER_CANISTER")?,
    )
    .with_identity_canister(canister("CANISTER_ID_INTERNET_IDENTITY").ok());

    let client = RegistrationClient::with_agent(config, Arc::new(PemFile(pem)))?;

    let principal = client.connect().await?;
    println!("Connected as {principal}");

    match client.approve_registration_cost().await? {
        Ok(block) => println!("Allowance approved in block {block}"),
        Err(err) => println!("Ledger rejected the approval: {err}"),
    }

    println!("Registration: {}", client.register().await?);
    Ok(())
}
