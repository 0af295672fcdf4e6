//! Behavioural tests for the event dispatcher, observed through fake collaborators.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tiperc20_bot::{replies, DispatchOutcome, DispatcherState, EventDispatcher};
use tiperc20_chat::{ChatEvent, Notifier, ReplyTarget, SlackApiError};
use tiperc20_ledger::{TokenTransfer, TransferError, TransferReceipt};
use tiperc20_registry::{
    AccountBinding, AddressRegistry, MemoryAccountRepository, RegistryError, RegistryResult,
};
use tokio::sync::mpsc;

const BOT: &str = "UBOT";
const ADDRESS_U3: &str = "0xdef0000000000000000000000000000000000003";
const TX_HASH: &str = "0x9c1e2f3a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f90a1b2c3d4e5f6";

#[derive(Default)]
struct RecordingTransfers {
    destinations: Mutex<Vec<String>>,
    fail_with_unreachable: bool,
}

#[async_trait]
impl TokenTransfer for RecordingTransfers {
    async fn transfer(&self, destination: &str) -> Result<TransferReceipt, TransferError> {
        self.destinations.lock().unwrap().push(destination.to_string());
        if self.fail_with_unreachable {
            return Err(TransferError::NodeUnreachable("connection refused".to_string()));
        }
        Ok(TransferReceipt {
            transaction_hash: TX_HASH.to_string(),
            pending: true,
        })
    }
}

impl RecordingTransfers {
    fn destinations(&self) -> Vec<String> {
        self.destinations.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(ReplyTarget, String)>>,
    fail: bool,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, target: &ReplyTarget, text: &str) -> Result<(), SlackApiError> {
        self.sent.lock().unwrap().push((target.clone(), text.to_string()));
        if self.fail {
            return Err(SlackApiError::Api("channel_not_found".to_string()));
        }
        Ok(())
    }
}

impl RecordingNotifier {
    fn sent(&self) -> Vec<(ReplyTarget, String)> {
        self.sent.lock().unwrap().clone()
    }
}

/// A store that can never answer.
struct UnavailableRegistry;

#[async_trait]
impl AddressRegistry for UnavailableRegistry {
    async fn lookup(&self, _identity: &str) -> RegistryResult<Option<String>> {
        Err(RegistryError::Unavailable("database is locked".to_string()))
    }

    async fn upsert(&self, _identity: &str, _address: &str) -> RegistryResult<()> {
        Err(RegistryError::Unavailable("database is locked".to_string()))
    }

    async fn list(&self) -> RegistryResult<Vec<AccountBinding>> {
        Err(RegistryError::Unavailable("database is locked".to_string()))
    }
}

struct Harness {
    dispatcher: EventDispatcher,
    registry: Arc<dyn AddressRegistry>,
    transfers: Arc<RecordingTransfers>,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn with(
        registry: Arc<dyn AddressRegistry>,
        transfers: RecordingTransfers,
        notifier: RecordingNotifier,
    ) -> Self {
        let transfers = Arc::new(transfers);
        let notifier = Arc::new(notifier);
        let dispatcher = EventDispatcher::new(
            "+1",
            registry.clone(),
            transfers.clone(),
            notifier.clone(),
        );
        Self {
            dispatcher,
            registry,
            transfers,
            notifier,
        }
    }

    fn new() -> Self {
        Self::with(
            Arc::new(MemoryAccountRepository::new()),
            RecordingTransfers::default(),
            RecordingNotifier::default(),
        )
    }

    async fn connected() -> Self {
        let mut harness = Self::new();
        harness.connect().await;
        harness
    }

    async fn connect(&mut self) {
        let state = self
            .dispatcher
            .handle(ChatEvent::Connected {
                bot_user_id: BOT.to_string(),
            })
            .await;
        assert_eq!(state, DispatcherState::Connected);
    }

    async fn message(&mut self, user: &str, text: &str) -> DispatcherState {
        self.dispatcher.handle(message(user, text)).await
    }

    async fn reaction(&mut self, reaction: &str, user: &str, item_user: &str) -> DispatcherState {
        self.dispatcher
            .handle(ChatEvent::ReactionAdded {
                reaction: reaction.to_string(),
                user: user.to_string(),
                item_user: item_user.to_string(),
                channel: "C1".to_string(),
            })
            .await
    }
}

fn message(user: &str, text: &str) -> ChatEvent {
    ChatEvent::Message {
        text: text.to_string(),
        user: user.to_string(),
        channel: "C1".to_string(),
    }
}

fn channel() -> ReplyTarget {
    ReplyTarget::Channel("C1".to_string())
}

fn user(id: &str) -> ReplyTarget {
    ReplyTarget::User(id.to_string())
}

#[tokio::test]
async fn register_binds_the_author() {
    let mut harness = Harness::connected().await;

    let state = harness
        .message("U1", "<@UBOT> register 0xABC1230000000000000000000000000000000001")
        .await;

    assert_eq!(state, DispatcherState::Running);
    assert_eq!(
        harness.registry.lookup("U1").await.unwrap().as_deref(),
        Some("0xabc1230000000000000000000000000000000001")
    );
    assert_eq!(
        harness.notifier.sent(),
        vec![(
            channel(),
            ":o: Registered `0xabc1230000000000000000000000000000000001`".to_string()
        )]
    );
}

#[tokio::test]
async fn second_registration_overrides_the_first() {
    let mut harness = Harness::connected().await;

    harness
        .message("U1", "<@UBOT> register 0x1111111111111111111111111111111111111111")
        .await;
    harness
        .message("U1", "<@UBOT> register 0x2222222222222222222222222222222222222222")
        .await;

    assert_eq!(
        harness.registry.lookup("U1").await.unwrap().as_deref(),
        Some("0x2222222222222222222222222222222222222222")
    );
    assert_eq!(harness.registry.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_address_is_rejected_without_storing() {
    let mut harness = Harness::connected().await;

    harness.message("U1", "<@UBOT> register 0x1234").await;

    assert_eq!(harness.registry.lookup("U1").await.unwrap(), None);
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, channel());
    assert!(sent[0].1.starts_with(":x: `0x1234` is not a valid address"));
}

#[tokio::test]
async fn tip_to_unregistered_user_prompts_them_and_transfers_nothing() {
    let mut harness = Harness::connected().await;

    harness.message("U1", "<@UBOT> tip <@U2>").await;

    assert!(harness.transfers.destinations().is_empty());
    assert_eq!(
        harness.notifier.sent(),
        vec![(user("U2"), replies::REGISTRATION_PROMPT.to_string())]
    );
}

#[tokio::test]
async fn tip_to_registered_user_submits_one_transfer() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    harness.message("U1", "<@UBOT> tip <@U3|carol>").await;

    assert_eq!(harness.transfers.destinations(), vec![ADDRESS_U3.to_string()]);
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, user("U3"));
    assert!(sent[0].1.contains(TX_HASH));
}

#[tokio::test]
async fn trigger_reaction_tips_the_message_author() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    let state = harness.reaction("+1", "U1", "U3").await;

    assert_eq!(state, DispatcherState::Running);
    assert_eq!(harness.transfers.destinations(), vec![ADDRESS_U3.to_string()]);
    assert_eq!(
        harness.notifier.sent(),
        vec![(user("U3"), replies::tip_sent(TX_HASH))]
    );
}

#[tokio::test]
async fn reactor_does_not_need_to_be_registered() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    harness.reaction("+1", "U-unregistered", "U3").await;

    assert_eq!(harness.transfers.destinations().len(), 1);
}

#[tokio::test]
async fn other_reactions_are_ignored() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    for reaction in ["smile", "+1::skin-tone-2", "-1", ""] {
        harness.reaction(reaction, "U1", "U3").await;
    }

    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn repeated_triggers_are_not_deduplicated() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    harness.reaction("+1", "U1", "U3").await;
    harness.reaction("+1", "U1", "U3").await;
    harness.message("U1", "<@UBOT> tip U3").await;

    assert_eq!(harness.transfers.destinations().len(), 3);
}

#[tokio::test]
async fn transfer_failure_is_reported_and_registry_untouched() {
    let mut harness = Harness::with(
        Arc::new(MemoryAccountRepository::new()),
        RecordingTransfers {
            fail_with_unreachable: true,
            ..RecordingTransfers::default()
        },
        RecordingNotifier::default(),
    );
    harness.connect().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    let state = harness.message("U1", "<@UBOT> tip <@U3>").await;

    assert_eq!(state, DispatcherState::Running);
    assert_eq!(harness.transfers.destinations().len(), 1);
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, channel());
    assert!(sent[0].1.starts_with(":x: ledger node is unreachable"));
    assert_eq!(
        harness.registry.lookup("U3").await.unwrap().as_deref(),
        Some(ADDRESS_U3)
    );
}

#[tokio::test]
async fn failed_reaction_tip_is_reported_in_channel() {
    let mut harness = Harness::with(
        Arc::new(MemoryAccountRepository::new()),
        RecordingTransfers {
            fail_with_unreachable: true,
            ..RecordingTransfers::default()
        },
        RecordingNotifier::default(),
    );
    harness.connect().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    harness.reaction("+1", "U1", "U3").await;

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, channel());
}

#[tokio::test]
async fn unavailable_registry_is_not_mistaken_for_unregistered() {
    let mut harness = Harness::with(
        Arc::new(UnavailableRegistry),
        RecordingTransfers::default(),
        RecordingNotifier::default(),
    );
    harness.connect().await;

    harness.message("U1", "<@UBOT> tip <@U3>").await;

    assert!(harness.transfers.destinations().is_empty());
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, channel());
    assert!(sent[0].1.contains("registry unavailable"));
    assert_ne!(sent[0].1, replies::REGISTRATION_PROMPT);
}

#[tokio::test]
async fn malformed_mentions_do_nothing() {
    let mut harness = Harness::connected().await;

    for text in ["<@UBOT>", "<@UBOT> tip", "<@UBOT>    ", "<@UBOT> register"] {
        let state = harness.message("U1", text).await;
        assert_eq!(state, DispatcherState::Running, "{text:?}");
    }

    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.notifier.sent().is_empty());
    assert!(harness.registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn tips_to_channels_or_broadcasts_are_never_sent() {
    let mut harness = Harness::connected().await;

    for text in [
        "<@UBOT> tip <#C1|general>",
        "<@UBOT> tip <!here>",
        "<@UBOT> tip <@U3",
        "<@UBOT>tip <@U3>",
    ] {
        let state = harness.message("U1", text).await;
        assert_eq!(state, DispatcherState::Running, "{text:?}");
    }

    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn messages_not_addressed_to_bot_are_ignored() {
    let mut harness = Harness::connected().await;
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    harness.message("U1", "tip <@U3>").await;
    harness.message("U1", "<@U2> tip <@U3>").await;

    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn unknown_verb_gets_generic_reply() {
    let mut harness = Harness::connected().await;

    harness.message("U1", "<@UBOT> balance <@U3>").await;

    assert_eq!(
        harness.notifier.sent(),
        vec![(channel(), replies::unknown_command("balance"))]
    );
    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.registry.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn events_before_connection_are_dropped() {
    let mut harness = Harness::new();
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();

    let state = harness.message("U1", "<@UBOT> tip <@U3>").await;
    assert_eq!(state, DispatcherState::Connecting);
    let state = harness.reaction("+1", "U1", "U3").await;
    assert_eq!(state, DispatcherState::Connecting);

    assert!(harness.transfers.destinations().is_empty());
    assert!(harness.notifier.sent().is_empty());
}

#[tokio::test]
async fn transport_errors_are_not_fatal() {
    let mut harness = Harness::connected().await;
    harness.message("U1", "hello").await;

    let state = harness
        .dispatcher
        .handle(ChatEvent::TransportError {
            message: "socket closed".to_string(),
        })
        .await;
    assert_eq!(state, DispatcherState::Running);

    let state = harness.dispatcher.handle(ChatEvent::Unrecognized).await;
    assert_eq!(state, DispatcherState::Running);
}

#[tokio::test]
async fn reply_failures_are_swallowed() {
    let mut harness = Harness::with(
        Arc::new(MemoryAccountRepository::new()),
        RecordingTransfers::default(),
        RecordingNotifier {
            fail: true,
            ..RecordingNotifier::default()
        },
    );
    harness.connect().await;

    let state = harness
        .message("U1", "<@UBOT> register 0x1111111111111111111111111111111111111111")
        .await;

    assert_eq!(state, DispatcherState::Running);
    assert_eq!(harness.notifier.sent().len(), 1, "no retry");
    assert!(harness.registry.lookup("U1").await.unwrap().is_some());
}

#[tokio::test]
async fn run_stops_on_invalid_credentials() {
    let harness = Harness::new();
    harness.registry.upsert("U3", ADDRESS_U3).await.unwrap();
    let transfers = harness.transfers.clone();

    let (tx, rx) = mpsc::channel(8);
    tx.send(ChatEvent::Connected {
        bot_user_id: BOT.to_string(),
    })
    .await
    .unwrap();
    tx.send(message("U1", "<@UBOT> tip <@U3>")).await.unwrap();
    tx.send(ChatEvent::InvalidCredentials).await.unwrap();
    tx.send(message("U1", "<@UBOT> tip <@U3>")).await.unwrap();

    let outcome = harness.dispatcher.run(rx).await;

    assert_eq!(outcome, DispatchOutcome::InvalidCredentials);
    assert_eq!(transfers.destinations().len(), 1, "nothing after termination");
}

#[tokio::test]
async fn run_ends_when_stream_closes() {
    let harness = Harness::new();
    let (tx, rx) = mpsc::channel(1);
    drop(tx);

    assert_eq!(harness.dispatcher.run(rx).await, DispatchOutcome::StreamClosed);
}

#[tokio::test]
async fn terminated_dispatcher_ignores_further_events() {
    let mut harness = Harness::connected().await;

    let state = harness.dispatcher.handle(ChatEvent::InvalidCredentials).await;
    assert_eq!(state, DispatcherState::Terminated);

    let state = harness.message("U1", "<@UBOT> balance").await;
    assert_eq!(state, DispatcherState::Terminated);
    assert!(harness.notifier.sent().is_empty());
}
