//! Transcript to request conversion.

use tracing::warn;

use crate::chat::core::data_uri::parse_data_uri;
use crate::chat::core::message::Message;
use crate::llm::service::{Content, Part};

/// Convert the transcript into request contents.
///
/// An attached image becomes an inline-data part ahead of the text; empty
/// text is omitted. Unreadable images are skipped.
#[must_use]
pub fn to_contents(history: &[Message]) -> Vec<Content> {
    history.iter().map(message_content).collect()
}

fn message_content(message: &Message) -> Content {
    let mut parts = Vec::with_capacity(2);

    if let Some(uri) = message.image.as_deref() {
        match parse_data_uri(uri) {
            Some(image) => parts.push(Part::InlineData(image)),
            None => warn!("Skipping unreadable image on message {}", message.id),
        }
    }
    if !message.content.is_empty() {
        parts.push(Part::Text(message.content.clone()));
    }

    Content {
        role: message.role,
        parts,
    }
}
