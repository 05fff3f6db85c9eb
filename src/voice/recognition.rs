//! Dictation into the prompt input.

use std::pin::Pin;

use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::chat::core::errors::{ChatError, ChatResult};

/// Evolving transcript; each item replaces the previous one.
pub type TranscriptStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// Speech recognition collaborator.
pub trait SpeechRecognizer: Send + Sync {
    /// Start listening.
    ///
    /// # Errors
    /// Returns [`ChatError::Unsupported`] when the host cannot recognise speech.
    fn listen(&self) -> ChatResult<TranscriptStream>;
}

/// Recognizer for hosts without speech input.
#[derive(Clone, Copy, Debug, Default)]
pub struct UnavailableRecognizer;

impl SpeechRecognizer for UnavailableRecognizer {
    fn listen(&self) -> ChatResult<TranscriptStream> {
        Err(ChatError::Unsupported("voice input".to_string()))
    }
}

/// Input text captured when dictation started.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Dictation {
    prefix: String,
}

impl Dictation {
    /// Begin dictation on top of the current input.
    #[must_use]
    pub fn begin(current_input: &str) -> Self {
        Self {
            prefix: current_input.to_string(),
        }
    }

    /// Input text for the latest transcript.
    #[must_use]
    pub fn compose(&self, transcript: &str) -> String {
        if self.prefix.is_empty() {
            transcript.to_string()
        } else {
            format!("{} {transcript}", self.prefix)
        }
    }
}

/// Run one dictation session, reporting every composed input to `on_update`.
///
/// Returns the final input text (the prefix alone if nothing was heard).
///
/// # Errors
/// Returns [`ChatError::Unsupported`] when no recognizer is available.
pub async fn dictate<F>(
    recognizer: &dyn SpeechRecognizer,
    current_input: &str,
    mut on_update: F,
) -> ChatResult<String>
where
    F: FnMut(&str) + Send,
{
    let mut transcripts = recognizer
        .listen()
        .inspect_err(|e| warn!("Dictation unavailable: {e}"))?;
    let dictation = Dictation::begin(current_input);

    let mut latest = current_input.to_string();
    while let Some(transcript) = transcripts.next().await {
        latest = dictation.compose(&transcript);
        debug!("Dictation update ({} chars)", latest.len());
        on_update(&latest);
    }
    Ok(latest)
}
