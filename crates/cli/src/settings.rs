//! Resolves the client configuration from a TOML file, `UPKEEP_*`
//! environment variables and the variables dfx exports for a project.

use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use upkeep_sdk::{ClientConfig, Network, Principal, Tokens};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "upkeep.toml";

/// dfx-style variables and the setting each one fills when still unset.
const DFX_VARIABLES: [(&str, Field); 4] = [
    ("DFX_NETWORK", Field::Network),
    ("CANISTER_ID", Field::Contract),
    ("CANISTER_ID_ICP_LEDGER_CANISTER", Field::Ledger),
    ("CANISTER_ID_INTERNET_IDENTITY", Field::InternetIdentity),
];

#[derive(Clone, Copy)]
enum Field {
    Network,
    Contract,
    Ledger,
    InternetIdentity,
}

/// Raw settings before validation. Every field is optional so the sources
/// can be layered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub network: Option<String>,
    pub host: Option<String>,
    pub contract_canister_id: Option<String>,
    pub ledger_canister_id: Option<String>,
    pub identity_canister_id: Option<String>,
    pub spender: Option<String>,
    pub registration_fee: Option<String>,
    pub max_time_to_live_secs: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
    pub disable_idle: Option<bool>,
    /// Key file or PEM used to log in.
    pub identity: Option<PathBuf>,
}

impl Settings {
    /// Layers the config file (explicit path, or `upkeep.toml` if present),
    /// `UPKEEP_*` variables, then dfx variables for anything still unset.
    pub fn load(
        config_path_override: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let resolved_path = match config_path_override {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!(
                        "Configuration file {} not found (specified via --config)",
                        path.display()
                    );
                }
                Some(path.to_path_buf())
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                path.exists().then_some(path)
            }
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix("UPKEEP").try_parsing(true));

        let mut settings: Settings = builder
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;
        settings.fill_from_dfx(lookup);
        Ok(settings)
    }

    fn fill_from_dfx(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (var, field) in DFX_VARIABLES {
            let slot = match field {
                Field::Network => &mut self.network,
                Field::Contract => &mut self.contract_canister_id,
                Field::Ledger => &mut self.ledger_canister_id,
                Field::InternetIdentity => &mut self.identity_canister_id,
            };
            if slot.is_none() {
                *slot = lookup(var).filter(|value| !value.trim().is_empty());
            }
        }
    }

    pub fn to_client_config(&self) -> Result<ClientConfig> {
        let network = match &self.network {
            Some(name) => name.parse::<Network>()?,
            None => Network::default(),
        };
        let contract = required_principal(
            self.contract_canister_id.as_deref(),
            "contract canister id (CANISTER_ID)",
        )?;
        let ledger = required_principal(
            self.ledger_canister_id.as_deref(),
            "ledger canister id (CANISTER_ID_ICP_LEDGER_CANISTER)",
        )?;

        let mut config = ClientConfig::new(network, contract, ledger)
            .with_host(self.host.clone())
            .with_identity_canister(optional_principal(
                self.identity_canister_id.as_deref(),
                "identity canister id",
            )?)
            .with_spender(optional_principal(self.spender.as_deref(), "spender")?);

        if let Some(fee) = &self.registration_fee {
            config.registration_fee = fee
                .parse::<Tokens>()
                .with_context(|| format!("invalid registration fee `{fee}`"))?;
        }
        if let Some(secs) = self.max_time_to_live_secs {
            config.max_time_to_live = Duration::from_secs(secs);
        }
        if let Some(ms) = self.idle_timeout_ms {
            config.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(disable) = self.disable_idle {
            config.disable_idle = disable;
        }

        config.validate()?;
        Ok(config)
    }

    /// Key file to log in with: the configured one, or the per-user default.
    pub fn identity_path(&self) -> Result<PathBuf> {
        match &self.identity {
            Some(path) => Ok(path.clone()),
            None => default_identity_path(),
        }
    }
}

pub fn default_identity_path() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("upkeep").join("identity.key"))
        .context("cannot determine the user config directory; pass --identity")
}

fn required_principal(value: Option<&str>, what: &str) -> Result<Principal> {
    let text = value.with_context(|| format!("missing {what}"))?;
    Principal::from_text(text).with_context(|| format!("invalid {what} `{text}`"))
}

fn optional_principal(value: Option<&str>, what: &str) -> Result<Option<Principal>> {
    value
        .map(|text| {
            Principal::from_text(text).with_context(|| format!("invalid {what} `{text}`"))
        })
        .transpose()
}
