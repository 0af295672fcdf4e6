//! The tip bot core: turns chat events into registrations and token transfers.

pub mod dispatcher;
pub mod parser;
pub mod replies;

pub use dispatcher::{DispatchOutcome, DispatcherState, EventDispatcher};
pub use parser::{Command, CommandParser, Parsed};
