//! Core chat types and identifiers.

pub mod config;
pub mod data_uri;
pub mod errors;
pub mod ids;
pub mod message;
pub mod session;

pub use config::{
    AppConfig, Complexity, GeminiConfig, Length, ModelKind, ResponseConfig, ServerConfig,
    SpeechConfig, StorageConfig, Tone,
};
pub use data_uri::{InlineImage, format_data_uri, parse_data_uri};
pub use errors::{ChatError, ChatResult};
pub use ids::{MessageId, SessionId};
pub use message::{GroundingMetadata, GroundingSource, Message, Role};
pub use session::{DEFAULT_TITLE, Session, derive_title, enforce_history_limit};
