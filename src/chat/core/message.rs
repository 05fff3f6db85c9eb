//! Message model for chat transcripts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chat::core::ids::MessageId;

/// Author of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Human input.
    User,
    /// Generated response.
    Model,
}

impl Role {
    /// Stable string form used on the wire and in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "model" => Ok(Self::Model),
            _ => Err(value.to_string()),
        }
    }
}

/// One source cited by a grounded response.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroundingSource {
    /// Source location.
    pub uri: String,
    /// Human-readable source title.
    pub title: String,
}

/// Source references attached to a response.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct GroundingMetadata {
    /// Cited sources in citation order.
    pub sources: Vec<GroundingSource>,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identifier, unique within the owning transcript.
    pub id: MessageId,
    /// Author of the message.
    pub role: Role,
    /// Text content; append-only while streaming.
    pub content: String,
    /// User-attached image as a data URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Model-generated image as a data URI. Set at most once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_image: Option<String>,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// True until the first fragment of any kind lands or the exchange settles.
    #[serde(default)]
    pub is_thinking: bool,
    /// Sources cited by the response, last write wins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grounding_metadata: Option<GroundingMetadata>,
}

impl Message {
    /// Build a user message with optional attached image.
    #[must_use]
    pub fn user(content: impl Into<String>, image: Option<String>) -> Self {
        Self {
            id: MessageId::new(),
            role: Role::User,
            content: content.into(),
            image,
            generated_image: None,
            timestamp: Utc::now(),
            is_thinking: false,
            grounding_metadata: None,
        }
    }

    /// Build the empty model message that a streamed response fills in.
    #[must_use]
    pub fn placeholder() -> Self {
        Self {
            id: MessageId::new(),
            role: Role::Model,
            content: String::new(),
            image: None,
            generated_image: None,
            timestamp: Utc::now(),
            is_thinking: true,
            grounding_metadata: None,
        }
    }
}

/// Render an attached text file as a fenced block appended to the prompt.
#[must_use]
pub fn file_block(name: &str, content: &str) -> String {
    format!("\n\n--- File: {name} ---\n```\n{content}\n```\n\n")
}
