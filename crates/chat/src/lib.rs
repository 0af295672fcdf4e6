//! Chat platform plumbing: the inbound event model, the Socket Mode
//! transport that produces it, and the outbound [`Notifier`].

pub mod api;
pub mod error;
pub mod events;
pub mod notifier;
pub mod socket;

pub use api::SlackApi;
pub use error::SlackApiError;
pub use events::{ChatEvent, ReplyTarget};
pub use notifier::{Notifier, SlackNotifier};
pub use socket::SocketModeTransport;
