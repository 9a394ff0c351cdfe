use crate::errors::{IdentityError, Result};
use crate::keyfile::{identity_from_pem, KeyFile};
use crate::password::PasswordSource;
use async_trait::async_trait;
use candid::Principal;
use ic_agent::identity::BasicIdentity;
use ic_agent::Identity;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use upkeep_sdk::{Credential, IdentityProvider, LoginError, LoginRequest};

const PEM_HEADER: &str = "-----BEGIN";

/// Logs in with a key stored on disk: either an upkeep key file or a dfx
/// PEM identity.
#[derive(Debug, Clone)]
pub struct KeyFileProvider {
    path: PathBuf,
    password: PasswordSource,
}

impl KeyFileProvider {
    pub fn new(path: impl Into<PathBuf>, password: PasswordSource) -> Self {
        Self {
            path: path.into(),
            password,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and unlocks the key. Blocks on the password prompt.
    pub fn load_identity(&self) -> Result<BasicIdentity> {
        let data = fs::read(&self.path)?;
        if data.starts_with(PEM_HEADER.as_bytes()) {
            debug!(path = %self.path.display(), "loading PEM identity");
            return identity_from_pem(&data);
        }

        let keyfile = KeyFile::from_slice(&data)?;
        let password = if keyfile.is_password_protected() {
            let prompt = format!("Password for {}: ", self.path.display());
            match self.password.resolve(&prompt)? {
                Some(password) => Some(password),
                None => return Err(IdentityError::PasswordRequired),
            }
        } else {
            None
        };
        keyfile
            .unlock(password.as_deref().map(String::as_str))?
            .to_identity()
    }

    /// Principal the key signs as.
    pub fn load_principal(&self) -> Result<Principal> {
        self.load_identity()?
            .sender()
            .map_err(IdentityError::AgentIdentity)
    }
}

#[async_trait]
impl IdentityProvider for KeyFileProvider {
    async fn login(&self, request: &LoginRequest) -> std::result::Result<Credential, LoginError> {
        info!(
            key = %self.path.display(),
            provider = %request.identity_provider,
            "unlocking local identity"
        );
        let provider = self.clone();
        let identity = tokio::task::spawn_blocking(move || provider.load_identity())
            .await
            .map_err(|err| LoginError::failed(format!("login task failed: {err}")))?
            .map_err(|err| match err {
                IdentityError::Cancelled => LoginError::Cancelled,
                other => LoginError::failed(other.to_string()),
            })?;
        Credential::for_request(Arc::new(identity), request)
    }
}
