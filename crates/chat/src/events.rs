/// Inbound chat events, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A transport session is up; carries the bot's own user id.
    Connected { bot_user_id: String },
    Message {
        text: String,
        user: String,
        channel: String,
    },
    ReactionAdded {
        reaction: String,
        /// Who reacted.
        user: String,
        /// Author of the message that was reacted to.
        item_user: String,
        channel: String,
    },
    /// The connection dropped or an API call failed; the transport will retry.
    TransportError { message: String },
    /// The platform rejected our tokens. Nothing further will arrive.
    InvalidCredentials,
    Unrecognized,
}

impl ChatEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::Connected { .. } => "connected",
            ChatEvent::Message { .. } => "message",
            ChatEvent::ReactionAdded { .. } => "reaction_added",
            ChatEvent::TransportError { .. } => "transport_error",
            ChatEvent::InvalidCredentials => "invalid_credentials",
            ChatEvent::Unrecognized => "unrecognized",
        }
    }
}

/// Where a reply goes: a channel, or a direct message to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReplyTarget {
    Channel(String),
    User(String),
}

impl ReplyTarget {
    /// Conversation id accepted by `chat.postMessage`; a user id opens the DM with that user.
    pub fn conversation_id(&self) -> &str {
        match self {
            ReplyTarget::Channel(id) | ReplyTarget::User(id) => id,
        }
    }
}
