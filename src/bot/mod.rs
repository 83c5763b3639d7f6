//! Command table and dispatch pipeline.

pub mod commands;
pub mod dispatch;

pub use commands::{parse_message, Command, ParsedCommand};
pub use dispatch::{Dispatcher, InboundMessage, OutgoingReply};
