//! User-facing conversation operations.

pub mod conversation;

pub use conversation::{ConversationController, SendOutcome, VOICE_PREVIEW_TEXT};
