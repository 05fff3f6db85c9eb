//! Folds response fragments into the in-progress message.

use tracing::{debug, warn};

use crate::chat::core::ids::MessageId;
use crate::chat::core::message::Message;
use crate::chat::stream::fragment::Fragment;

/// Notice appended to a message whose exchange failed.
pub const ERROR_NOTICE: &str = "\n\n**Error:** Something went wrong. Please try again.";

/// Apply one fragment to the message `id` in `messages`.
///
/// Returns `false` when no message has that id; the transcript is left
/// untouched in that case.
pub fn apply_fragment(messages: &mut [Message], id: MessageId, fragment: Fragment) -> bool {
    let Some(message) = find(messages, id) else {
        debug!("Dropping {} fragment for unknown message {id}", fragment.kind());
        return false;
    };

    match fragment {
        Fragment::Text(text) => {
            message.content.push_str(&text);
            message.is_thinking = false;
        }
        Fragment::Metadata(metadata) => {
            message.grounding_metadata = Some(metadata);
            message.is_thinking = false;
        }
        Fragment::Image(data_uri) => {
            if message.generated_image.is_some() {
                warn!("Message {id} already has a generated image; ignoring another");
            } else {
                message.generated_image = Some(data_uri);
            }
            message.is_thinking = false;
        }
    }
    true
}

/// Settle the message `id` after a clean close, even if nothing arrived.
pub fn apply_completion(messages: &mut [Message], id: MessageId) -> bool {
    let Some(message) = find(messages, id) else {
        return false;
    };
    message.is_thinking = false;
    true
}

/// Mark the message `id` as failed, keeping whatever content already arrived.
pub fn apply_failure(messages: &mut [Message], id: MessageId) -> bool {
    let Some(message) = find(messages, id) else {
        return false;
    };
    message.content.push_str(ERROR_NOTICE);
    message.is_thinking = false;
    true
}

fn find(messages: &mut [Message], id: MessageId) -> Option<&mut Message> {
    messages.iter_mut().find(|m| m.id == id)
}
