//! Text-to-speech.

use std::future::Future;
use std::io::ErrorKind;
use std::pin::Pin;
use std::process::Stdio;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat::core::config::SpeechConfig;
use crate::chat::core::errors::{ChatError, ChatResult};

/// Boxed future type for speech operations.
pub type SpeechFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A voice offered by the host.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Voice {
    /// Identifier passed back to [`SpeechSynthesizer::speak`].
    pub id: String,
    /// Human readable name.
    pub name: String,
    /// Language tag.
    pub language: String,
}

/// Speech synthesis collaborator.
pub trait SpeechSynthesizer: Send + Sync {
    /// Voices available on the host.
    ///
    /// # Errors
    /// Returns [`ChatError::Unsupported`] when the host has no synthesizer.
    fn list_voices(&self) -> SpeechFuture<'_, ChatResult<Vec<Voice>>>;

    /// Speak `text`, cancelling any utterance still in progress.
    ///
    /// An empty `voice_id` selects the host default.
    ///
    /// # Errors
    /// Returns an error if the utterance cannot be started.
    fn speak<'a>(&'a self, text: &'a str, voice_id: &'a str) -> SpeechFuture<'a, ChatResult<()>>;

    /// Stop the current utterance, if any.
    ///
    /// # Errors
    /// Returns an error if the utterance cannot be stopped.
    fn cancel(&self) -> SpeechFuture<'_, ChatResult<()>>;
}

/// Synthesizer driving an external program (`espeak` by default).
///
/// Text is written to the program's stdin; the voice is selected with `-v`.
/// At most one utterance runs at a time.
#[derive(Debug)]
pub struct CommandSpeech {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Child>>,
}

impl CommandSpeech {
    /// Create a synthesizer from configuration.
    #[must_use]
    pub fn new(config: &SpeechConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            current: Mutex::new(None),
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> ChatError {
        if err.kind() == ErrorKind::NotFound {
            ChatError::Unsupported(format!("speech synthesis ({})", self.program))
        } else {
            ChatError::Io(err)
        }
    }

    async fn voices(&self) -> ChatResult<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;
        Ok(parse_voice_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn stop(current: &mut Option<Child>) {
        if let Some(mut child) = current.take() {
            if let Err(e) = child.kill().await {
                debug!("Speech process already gone: {e}");
            }
        }
    }

    async fn start(&self, text: &str, voice_id: &str) -> ChatResult<()> {
        // Held until the new child is stored so overlapping calls queue up.
        let mut current = self.current.lock().await;
        Self::stop(&mut current).await;

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if !voice_id.is_empty() {
            command.arg("-v").arg(voice_id);
        }
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        info!("Speaking {} chars with {}", text.chars().count(), self.program);
        *current = Some(child);
        Ok(())
    }
}

impl SpeechSynthesizer for CommandSpeech {
    fn list_voices(&self) -> SpeechFuture<'_, ChatResult<Vec<Voice>>> {
        Box::pin(self.voices())
    }

    fn speak<'a>(&'a self, text: &'a str, voice_id: &'a str) -> SpeechFuture<'a, ChatResult<()>> {
        Box::pin(self.start(text, voice_id))
    }

    fn cancel(&self) -> SpeechFuture<'_, ChatResult<()>> {
        Box::pin(async move {
            Self::stop(&mut *self.current.lock().await).await;
            Ok(())
        })
    }
}

/// Parse the table printed by `espeak --voices`.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en  (en 2)
/// ```
fn parse_voice_listing(listing: &str) -> Vec<Voice> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("Pty"))
        .skip(1)
        .filter_map(|line| {
            let mut columns = line.split_whitespace();
            let _priority = columns.next()?;
            let language = columns.next()?;
            let _age_gender = columns.next()?;
            let name = columns.next()?;
            Some(Voice {
                id: language.to_string(),
                name: name.replace('_', " "),
                language: language.to_string(),
            })
        })
        .collect()
}

/// Speak `text` on a background task, logging failures.
pub(crate) fn speak_detached(
    synthesizer: std::sync::Arc<dyn SpeechSynthesizer>,
    text: String,
    voice_id: String,
) {
    tokio::spawn(async move {
        if let Err(e) = synthesizer.speak(&text, &voice_id).await {
            warn!("Text-to-speech failed: {e}");
        }
    });
}
