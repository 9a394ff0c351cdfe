//! Upkeep registration command line client
//!
//! Logs in with a local identity, approves the registration fee on the ICP
//! ledger and registers with the contract canister.

mod settings;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use settings::Settings;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use upkeep_identity::{KeyFile, KeyFileProvider, PasswordSource};
use upkeep_sdk::{ClientError, RegistrationClient, RegistrationOutcome};

#[derive(Parser)]
#[command(name = "upkeep")]
#[command(about = "Pay the registration fee and register with the upkeep contract", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./upkeep.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Network the canisters live on: local or ic (overrides DFX_NETWORK)
    #[arg(long, global = true)]
    network: Option<String>,

    /// Replica URL (defaults to the network's host)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Key file or dfx PEM used to log in
    #[arg(long, global = true, value_name = "PATH")]
    identity: Option<PathBuf>,

    #[command(flatten)]
    password: PasswordArgs,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "plain")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Plain,
    Pretty,
}

#[derive(Args, Debug, Default)]
struct PasswordArgs {
    /// Read the key file password from a file (first line is used)
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "password_env")]
    password_file: Option<PathBuf>,

    /// Read the key file password from an environment variable
    #[arg(long, global = true, value_name = "VAR")]
    password_env: Option<String>,

    /// Never prompt; fail if the key file needs a password
    #[arg(long, global = true, action = ArgAction::SetTrue)]
    no_prompt: bool,
}

impl PasswordArgs {
    fn source(&self) -> PasswordSource {
        if let Some(path) = &self.password_file {
            PasswordSource::File(path.clone())
        } else if let Some(var) = &self.password_env {
            PasswordSource::Env(var.clone())
        } else if self.no_prompt {
            PasswordSource::None
        } else {
            PasswordSource::Prompt
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and print the caller principal
    Connect,
    /// Approve the contract to withdraw the registration fee
    Approve,
    /// Call register on the contract
    Register,
    /// Connect, approve the fee and register in one go
    Run,
    /// Interactive session: connect, approve and register in any order
    Shell,
    /// Generate a new identity key file
    Keygen(KeygenArgs),
    /// Print the principal of the configured identity without contacting the network
    Whoami,
    /// Print the resolved configuration as JSON
    Config,
}

#[derive(Args)]
struct KeygenArgs {
    /// Output path (defaults to the configured identity path)
    #[arg(long)]
    out: Option<PathBuf>,

    /// Overwrite the key file if it already exists
    #[arg(long, action = ArgAction::SetTrue)]
    force: bool,

    /// Store the private key unencrypted (requires explicit opt-in)
    #[arg(long, action = ArgAction::SetTrue)]
    insecure_plaintext: bool,

    /// Also write the key as a PKCS#8 PEM for `dfx identity import`
    #[arg(long, value_name = "PATH")]
    export_pem: Option<PathBuf>,

    /// Optional free-form notes embedded in the key metadata
    #[arg(long)]
    notes: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let settings = load_settings(&cli)?;

    match cli.command {
        Commands::Connect => {
            let client = build_client(&settings, &cli.password)?;
            connect(&client).await
        }
        Commands::Approve => {
            let client = build_client(&settings, &cli.password)?;
            connect(&client).await?;
            approve(&client).await
        }
        Commands::Register => {
            let client = build_client(&settings, &cli.password)?;
            connect(&client).await?;
            register(&client).await
        }
        Commands::Run => {
            let client = build_client(&settings, &cli.password)?;
            connect(&client).await?;
            approve(&client).await?;
            register(&client).await
        }
        Commands::Shell => {
            let client = Arc::new(build_client(&settings, &cli.password)?);
            run_shell(client).await
        }
        Commands::Keygen(args) => handle_keygen(args, &settings, &cli.password),
        Commands::Whoami => handle_whoami(&settings, &cli.password),
        Commands::Config => handle_config(&settings),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref(), |key| std::env::var(key).ok())?;
    if let Some(network) = &cli.network {
        settings.network = Some(network.clone());
    }
    if let Some(host) = &cli.host {
        settings.host = Some(host.clone());
    }
    if let Some(identity) = &cli.identity {
        settings.identity = Some(identity.clone());
    }
    debug!(?settings, "resolved settings");
    Ok(settings)
}

fn build_client(settings: &Settings, password: &PasswordArgs) -> Result<RegistrationClient> {
    let config = settings.to_client_config()?;
    let provider = KeyFileProvider::new(settings.identity_path()?, password.source());
    Ok(RegistrationClient::with_agent(config, Arc::new(provider))?)
}

async fn connect(client: &RegistrationClient) -> Result<()> {
    let principal = client.connect().await.context("connect failed")?;
    println!("Connected as {principal}");
    Ok(())
}

async fn approve(client: &RegistrationClient) -> Result<()> {
    let fee = client.config().registration_fee;
    match client
        .approve_registration_cost()
        .await
        .context("approve failed")?
    {
        Ok(block) => println!("Approved {fee} for {} (block {block})", client.config().spender()),
        Err(err) => println!("Ledger rejected approval of {fee}: {err}"),
    }
    Ok(())
}

async fn register(client: &RegistrationClient) -> Result<()> {
    let outcome = client.register().await.context("register failed")?;
    match outcome {
        RegistrationOutcome::Registered => println!("Registered"),
        RegistrationOutcome::InsufficientFunds => println!("Not registered: {outcome}"),
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellCommand {
    Connect,
    Approve,
    Register,
    Disconnect,
    Whoami,
    Help,
    Quit,
}

impl ShellCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "connect" | "c" => Some(ShellCommand::Connect),
            "approve" | "a" => Some(ShellCommand::Approve),
            "register" | "r" => Some(ShellCommand::Register),
            "disconnect" | "logout" => Some(ShellCommand::Disconnect),
            "whoami" => Some(ShellCommand::Whoami),
            "help" | "?" => Some(ShellCommand::Help),
            "quit" | "exit" | "q" => Some(ShellCommand::Quit),
            _ => None,
        }
    }
}

const SHELL_HELP: &str = "\
commands:
  connect     log in and create the ledger and contract handles
  approve     approve the registration fee on the ledger
  register    register with the contract
  disconnect  drop the session
  whoami      show the connected principal
  quit        wait for pending calls and exit";

/// Approve and register run as background tasks so a new command can be
/// issued while one is still in flight.
async fn run_shell(client: Arc<RegistrationClient>) -> Result<()> {
    println!("{SHELL_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some(command) = ShellCommand::parse(&line) else {
            println!("unknown command `{}` (try `help`)", line.trim());
            continue;
        };

        match command {
            ShellCommand::Help => println!("{SHELL_HELP}"),
            ShellCommand::Quit => break,
            ShellCommand::Whoami => match client.principal() {
                Some(principal) => println!("{principal}"),
                None => println!("not connected"),
            },
            ShellCommand::Disconnect => {
                client.disconnect();
                println!("Disconnected");
            }
            // Login may prompt on the terminal, so it does not race the reader.
            ShellCommand::Connect => {
                if let Err(err) = connect(&client).await {
                    report_shell_error(&err);
                }
            }
            ShellCommand::Approve | ShellCommand::Register => {
                let client = Arc::clone(&client);
                pending.spawn(async move {
                    let result = if command == ShellCommand::Approve {
                        approve(&client).await
                    } else {
                        register(&client).await
                    };
                    if let Err(err) = result {
                        report_shell_error(&err);
                    }
                });
            }
        }

        while let Some(done) = pending.try_join_next() {
            if let Err(err) = done {
                warn!(error = %err, "shell task failed");
            }
        }
    }

    while let Some(done) = pending.join_next().await {
        if let Err(err) = done {
            warn!(error = %err, "shell task failed");
        }
    }
    Ok(())
}

fn report_shell_error(err: &anyhow::Error) {
    let reconnect = err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::requires_reconnect);
    if reconnect {
        println!("{}", err.root_cause());
    } else {
        println!("error: {err:#}");
    }
}

fn handle_keygen(args: KeygenArgs, settings: &Settings, password: &PasswordArgs) -> Result<()> {
    let out = match args.out {
        Some(path) => path,
        None => settings.identity_path()?,
    };

    let password = if args.insecure_plaintext {
        None
    } else {
        let source = password.source();
        let first = source
            .resolve("New key file password: ")?
            .context("a password is required (or pass --insecure-plaintext)")?;
        if source.is_interactive() {
            let confirm = source
                .resolve("Repeat password: ")?
                .context("password confirmation required")?;
            anyhow::ensure!(*first == *confirm, "passwords do not match");
        }
        Some(first)
    };

    let (mut keyfile, unlocked) = KeyFile::generate(
        password.as_deref().map(String::as_str),
        settings.network.clone(),
        args.insecure_plaintext,
    )?;
    keyfile.metadata.notes = args.notes;
    keyfile
        .save(&out, args.force)
        .with_context(|| format!("failed to write key file {}", out.display()))?;

    println!("Key file: {}", out.display());
    println!("Principal: {}", unlocked.principal);
    if let Some(warning) = &keyfile.metadata.warning {
        println!("Warning: {warning}");
    }

    if let Some(pem_path) = args.export_pem {
        if pem_path.exists() && !args.force {
            anyhow::bail!(
                "{} already exists (use --force to overwrite)",
                pem_path.display()
            );
        }
        std::fs::write(&pem_path, unlocked.to_pem().as_bytes())
            .with_context(|| format!("failed to write {}", pem_path.display()))?;
        println!("PEM: {}", pem_path.display());
    }
    Ok(())
}

fn handle_whoami(settings: &Settings, password: &PasswordArgs) -> Result<()> {
    let path = settings.identity_path()?;
    let principal = KeyFileProvider::new(&path, password.source())
        .load_principal()
        .with_context(|| format!("failed to load identity {}", path.display()))?;
    println!("{principal}");
    Ok(())
}

fn handle_config(settings: &Settings) -> Result<()> {
    let resolved = resolved_config(settings)?;
    println!("{}", serde_json::to_string_pretty(&resolved)?);
    Ok(())
}

fn resolved_config(settings: &Settings) -> Result<serde_json::Value> {
    let config = settings.to_client_config()?;
    let idle_timeout_ms = config
        .idle_limit()
        .map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX));
    Ok(serde_json::json!({
        "network": config.network.as_str(),
        "host": config.host(),
        "identity_provider": config.identity_provider_url()?,
        "contract_canister_id": config.contract_canister_id.to_text(),
        "ledger_canister_id": config.ledger_canister_id.to_text(),
        "spender": config.spender().to_text(),
        "registration_fee_e8s": config.registration_fee.e8s(),
        "registration_fee": config.registration_fee.to_string(),
        "max_time_to_live_secs": config.max_time_to_live.as_secs(),
        "idle_timeout_ms": idle_timeout_ms,
        "identity": settings.identity_path()?,
    }))
}
