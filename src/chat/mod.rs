//! Chat client core: sessions, streaming reconciliation, exchanges and the
//! conversation controller.

pub mod controller;
pub mod core;
pub mod orchestrator;
pub mod storage;
pub mod stream;

pub use controller::{ConversationController, SendOutcome};
pub use self::core::{ChatError, ChatResult};
