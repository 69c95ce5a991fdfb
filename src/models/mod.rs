//! Conversation types shared by handlers and forwarders

pub mod message;

pub use message::{Message, Role};
