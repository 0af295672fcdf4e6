use std::sync::Arc;

use tiperc20_chat::{ChatEvent, Notifier, ReplyTarget};
use tiperc20_ledger::{LedgerAddress, TokenTransfer};
use tiperc20_registry::AddressRegistry;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::parser::{Command, CommandParser, Parsed};
use crate::replies;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Connecting,
    Connected,
    Running,
    Terminated,
}

/// Why [`EventDispatcher::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    InvalidCredentials,
    /// The transport went away without reporting a credential failure.
    StreamClosed,
}

/// Processes chat events one at a time, in arrival order.
pub struct EventDispatcher {
    registry: Arc<dyn AddressRegistry>,
    transfers: Arc<dyn TokenTransfer>,
    notifier: Arc<dyn Notifier>,
    tip_reaction: String,
    bot_user_id: Option<String>,
    state: DispatcherState,
}

impl EventDispatcher {
    pub fn new(
        tip_reaction: impl Into<String>,
        registry: Arc<dyn AddressRegistry>,
        transfers: Arc<dyn TokenTransfer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            transfers,
            notifier,
            tip_reaction: tip_reaction.into(),
            bot_user_id: None,
            state: DispatcherState::Connecting,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub async fn run(mut self, mut events: mpsc::Receiver<ChatEvent>) -> DispatchOutcome {
        while let Some(event) = events.recv().await {
            if self.handle(event).await == DispatcherState::Terminated {
                return DispatchOutcome::InvalidCredentials;
            }
        }
        DispatchOutcome::StreamClosed
    }

    /// Process one event to completion and return the resulting state.
    pub async fn handle(&mut self, event: ChatEvent) -> DispatcherState {
        if self.state == DispatcherState::Terminated {
            return self.state;
        }

        debug!(kind = event.kind(), state = ?self.state, "chat event");

        match event {
            ChatEvent::Connected { bot_user_id } => {
                info!(%bot_user_id, "chat connection established");
                self.bot_user_id = Some(bot_user_id);
                if self.state == DispatcherState::Connecting {
                    self.transition(DispatcherState::Connected);
                }
            }
            ChatEvent::Message {
                text,
                user,
                channel,
            } => {
                if let Some(bot_user_id) = self.active_bot_id() {
                    self.handle_message(&bot_user_id, &text, &user, &channel).await;
                }
            }
            ChatEvent::ReactionAdded {
                reaction,
                user,
                item_user,
                channel,
            } => {
                if self.active_bot_id().is_some() {
                    self.handle_reaction(&reaction, &user, &item_user, &channel).await;
                }
            }
            ChatEvent::TransportError { message } => {
                warn!(%message, "chat transport error");
            }
            ChatEvent::InvalidCredentials => {
                error!("chat platform rejected credentials");
                self.transition(DispatcherState::Terminated);
            }
            ChatEvent::Unrecognized => {}
        }

        self.state
    }

    fn transition(&mut self, next: DispatcherState) {
        debug!(from = ?self.state, to = ?next, "dispatcher state change");
        self.state = next;
    }

    /// Bot id for a message or reaction, promoting `Connected` to `Running`.
    /// Events that arrive before the connection is established are dropped.
    fn active_bot_id(&mut self) -> Option<String> {
        let id = match self.state {
            DispatcherState::Connected | DispatcherState::Running => self.bot_user_id.clone(),
            DispatcherState::Connecting | DispatcherState::Terminated => None,
        };
        if id.is_none() {
            debug!("dropping event received before connection was established");
            return None;
        }

        if self.state == DispatcherState::Connected {
            self.transition(DispatcherState::Running);
        }
        id
    }

    async fn handle_message(&self, bot_user_id: &str, text: &str, user: &str, channel: &str) {
        let command = match CommandParser::parse(text, bot_user_id) {
            Parsed::NotAddressed => return,
            Parsed::Malformed => {
                debug!(%user, %channel, "ignoring malformed mention");
                return;
            }
            Parsed::Command(command) => command,
        };

        match command {
            Command::Tip { target } => {
                info!(source = %user, %target, "tip command");
                self.tip(&target, channel).await;
            }
            Command::Register { address } => self.register(user, &address, channel).await,
            Command::Unknown { verb } => {
                info!(%user, %verb, "unknown command");
                self.reply(
                    ReplyTarget::Channel(channel.to_string()),
                    replies::unknown_command(&verb),
                )
                .await;
            }
        }
    }

    async fn handle_reaction(&self, reaction: &str, user: &str, item_user: &str, channel: &str) {
        if reaction != self.tip_reaction {
            return;
        }
        info!(source = %user, target = %item_user, %reaction, "tip reaction");
        self.tip(item_user, channel).await;
    }

    /// Shared by commands and reactions: the target gets the outcome directly,
    /// failures to transfer are reported in `channel`.
    async fn tip(&self, target: &str, channel: &str) {
        let address = match self.registry.lookup(target).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                debug!(%target, "tip target has not registered");
                self.reply(
                    ReplyTarget::User(target.to_string()),
                    replies::REGISTRATION_PROMPT.to_string(),
                )
                .await;
                return;
            }
            Err(error) => {
                warn!(%target, %error, "address lookup failed");
                self.reply(
                    ReplyTarget::Channel(channel.to_string()),
                    replies::failure(&format!("could not look up <@{target}>: {error}")),
                )
                .await;
                return;
            }
        };

        match self.transfers.transfer(&address).await {
            Ok(receipt) => {
                self.reply(
                    ReplyTarget::User(target.to_string()),
                    replies::tip_sent(&receipt.transaction_hash),
                )
                .await;
            }
            Err(error) => {
                warn!(%target, %address, %error, "token transfer failed");
                self.reply(
                    ReplyTarget::Channel(channel.to_string()),
                    replies::failure(&error.to_string()),
                )
                .await;
            }
        }
    }

    async fn register(&self, user: &str, address: &str, channel: &str) {
        let reply_to = ReplyTarget::Channel(channel.to_string());

        let address = match LedgerAddress::parse(address) {
            Ok(parsed) => parsed.to_string(),
            Err(error) => {
                info!(%user, %address, %error, "rejected registration");
                self.reply(
                    reply_to,
                    replies::failure(&format!("`{address}` is not a valid address: {error}")),
                )
                .await;
                return;
            }
        };

        match self.registry.upsert(user, &address).await {
            Ok(()) => {
                info!(%user, %address, "address registered");
                self.reply(reply_to, replies::registered(&address)).await;
            }
            Err(error) => {
                warn!(%user, %error, "registration failed");
                self.reply(reply_to, replies::failure(&error.to_string())).await;
            }
        }
    }

    async fn reply(&self, target: ReplyTarget, text: String) {
        if let Err(error) = self.notifier.send(&target, &text).await {
            warn!(?target, %error, "failed to deliver reply");
        }
    }
}
