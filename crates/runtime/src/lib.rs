use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tiperc20_bot::EventDispatcher;
use tiperc20_chat::{ChatEvent, SlackApi, SlackNotifier, SocketModeTransport};
use tiperc20_config::AppConfig;
use tiperc20_ledger::TransferOrchestrator;
use tiperc20_registry::{open_registry, AddressRegistry};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Events buffered between the transport and the dispatcher while a transfer is in flight.
const EVENT_QUEUE_CAPACITY: usize = 256;

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::TRACE)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

pub mod health {
    use axum::{routing::get, Router};

    pub const BANNER: &str = "TipERC20: https://github.com/kentaro/tiperc20";

    pub async fn banner() -> &'static str {
        BANNER
    }

    pub fn router() -> Router {
        Router::new().route("/", get(banner))
    }
}

/// Everything the bot needs, constructed once from configuration.
#[derive(Clone)]
pub struct BotServices {
    pub registry: Arc<dyn AddressRegistry>,
    pub transfers: Arc<TransferOrchestrator>,
    pub slack: Arc<SlackApi>,
    tip_reaction: String,
    reconnect_delay: Duration,
}

impl BotServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let registry = open_registry(&config.registry)
            .await
            .context("failed to open address registry")?;

        let transfers = Arc::new(
            TransferOrchestrator::from_config(config)
                .context("failed to configure transfer orchestrator")?,
        );

        let slack = Arc::new(SlackApi::new(&config.slack).context("failed to build slack client")?);

        info!(
            backend = ?config.registry.backend,
            token = %transfers.token_address(),
            endpoint = %config.ledger.endpoint,
            tip_reaction = %config.slack.tip_reaction,
            amount = config.tip.amount,
            "bot services ready"
        );

        Ok(Self {
            registry,
            transfers,
            slack,
            tip_reaction: config.slack.tip_reaction.clone(),
            reconnect_delay: Duration::from_secs(config.slack.reconnect_delay_seconds),
        })
    }

    /// Start the Socket Mode connection task; events arrive on the returned receiver.
    pub fn spawn_transport(&self) -> (JoinHandle<()>, mpsc::Receiver<ChatEvent>) {
        let (sender, receiver) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let transport = SocketModeTransport::new(self.slack.clone(), self.reconnect_delay);
        (tokio::spawn(transport.run(sender)), receiver)
    }

    pub fn dispatcher(&self) -> EventDispatcher {
        EventDispatcher::new(
            self.tip_reaction.clone(),
            self.registry.clone(),
            self.transfers.clone(),
            Arc::new(SlackNotifier::new(self.slack.clone())),
        )
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
