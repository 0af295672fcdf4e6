use anyhow::Context;
use clap::{Parser, Subcommand};
use tiperc20_bot::DispatchOutcome;
use tiperc20_config::{load as load_config, AppConfig};
use tiperc20_ledger::LedgerAddress;
use tiperc20_registry::{open_registry, AccountBinding, AddressRegistry};
use tiperc20_runtime::{health, shutdown_signal, telemetry, BotServices};
use tokio::net::TcpListener;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tiperc20")]
#[command(about = "Slack tip bot paying ERC-20 tokens (serves by default)")]
struct Cli {
    /// Port for the health endpoint; overrides configuration
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, PartialEq, Eq, Subcommand)]
enum Commands {
    /// Connect to Slack and start tipping (default)
    Serve,
    /// List every registered address
    Accounts,
    /// Show the address registered for one Slack user
    Lookup { identity: String },
    /// Register or replace the address for a Slack user
    Register { identity: String, address: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;

    let mut config = load_config().context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_bot(config).await,
        Commands::Accounts => list_accounts(&config).await,
        Commands::Lookup { identity } => lookup_account(&config, &identity).await,
        Commands::Register { identity, address } => {
            register_account(&config, &identity, &address).await
        }
    }
}

async fn run_bot(config: AppConfig) -> anyhow::Result<()> {
    info!("starting tiperc20");

    let services = BotServices::initialise(&config)
        .await
        .context("failed to initialise bot services")?;

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind health listener on {address}"))?;
    info!(%address, "health endpoint listening");

    let health_server = tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, health::router()).await {
            error!(%error, "health endpoint stopped");
        }
    });

    let (transport, events) = services.spawn_transport();
    let dispatcher = services.dispatcher();

    let outcome = tokio::select! {
        outcome = dispatcher.run(events) => Some(outcome),
        _ = shutdown_signal() => None,
    };

    transport.abort();
    health_server.abort();

    match outcome {
        Some(DispatchOutcome::InvalidCredentials) => {
            anyhow::bail!("slack rejected the configured credentials")
        }
        Some(DispatchOutcome::StreamClosed) => {
            anyhow::bail!("chat transport stopped unexpectedly")
        }
        None => {
            info!("tiperc20 shut down");
            Ok(())
        }
    }
}

async fn registry(config: &AppConfig) -> anyhow::Result<std::sync::Arc<dyn AddressRegistry>> {
    open_registry(&config.registry)
        .await
        .context("failed to open address registry")
}

async fn list_accounts(config: &AppConfig) -> anyhow::Result<()> {
    let accounts = registry(config)
        .await?
        .list()
        .await
        .context("failed to list accounts")?;

    print!("{}", render_accounts(&accounts));
    Ok(())
}

async fn lookup_account(config: &AppConfig, identity: &str) -> anyhow::Result<()> {
    match registry(config)
        .await?
        .lookup(identity)
        .await
        .with_context(|| format!("failed to look up {identity}"))?
    {
        Some(address) => println!("{identity}\t{address}"),
        None => println!("{identity} has not registered an address"),
    }
    Ok(())
}

async fn register_account(config: &AppConfig, identity: &str, address: &str) -> anyhow::Result<()> {
    let address = LedgerAddress::parse(address)
        .with_context(|| format!("`{address}` is not a valid address"))?
        .to_string();

    registry(config)
        .await?
        .upsert(identity, &address)
        .await
        .with_context(|| format!("failed to register {identity}"))?;

    println!("Registered {identity} -> {address}");
    Ok(())
}

fn render_accounts(accounts: &[AccountBinding]) -> String {
    if accounts.is_empty() {
        return "No accounts registered\n".to_string();
    }

    let mut out = format!("Found {} accounts:\n", accounts.len());
    out.push_str(&format!(
        "{:<15} {:<44} {:<35}\n",
        "Slack User", "Ethereum Address", "Updated At"
    ));
    out.push_str(&"-".repeat(94));
    out.push('\n');
    for account in accounts {
        out.push_str(&format!(
            "{:<15} {:<44} {:<35}\n",
            account.slack_user_id, account.ethereum_address, account.updated_at
        ));
    }
    out
}
