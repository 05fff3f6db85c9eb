//! One request/response exchange with the generation service.

use std::sync::Arc;

use futures::StreamExt;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::chat::core::config::{ModelKind, ResponseConfig};
use crate::chat::core::data_uri::format_data_uri;
use crate::chat::core::errors::{ChatError, ChatResult};
use crate::chat::core::message::Message;
use crate::chat::orchestrator::outbound::to_contents;
use crate::chat::orchestrator::prompt::build_system_instruction;
use crate::chat::stream::fragment::{ExchangePhase, Fragment};
use crate::llm::service::{GenerationRequest, GenerationResponse, GenerationService, Part};
use crate::voice::synthesis::{SpeechSynthesizer, speak_detached};

/// Aspect ratio requested in image-generation mode.
pub const IMAGE_ASPECT_RATIO: &str = "1:1";

/// Markdown markers removed before text is spoken.
const MARKDOWN_MARKERS: &str = r"[*#_`]";

/// Inputs of one exchange.
#[derive(Clone, Copy, Debug)]
pub struct ExchangeRequest<'a> {
    /// Transcript to send, oldest first, without the placeholder.
    pub history: &'a [Message],
    /// Selected model.
    pub model: ModelKind,
    /// Ask for web-search grounding (ignored in image mode).
    pub enable_search: bool,
    /// Response settings.
    pub config: &'a ResponseConfig,
}

/// Outcome of a settled exchange.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExchangeReport {
    /// Final phase, always terminal.
    pub phase: ExchangePhase,
    /// Concatenated text of all text fragments.
    pub text: String,
    /// Number of fragments emitted.
    pub fragments: usize,
}

/// Runs exchanges against a [`GenerationService`].
pub struct ResponseOrchestrator {
    service: Arc<dyn GenerationService>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    markdown: Regex,
}

impl ResponseOrchestrator {
    /// Create an orchestrator.
    ///
    /// # Errors
    /// Returns an error if the markdown pattern fails to compile.
    pub fn new(
        service: Arc<dyn GenerationService>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> ChatResult<Self> {
        Ok(Self {
            service,
            speech,
            markdown: Regex::new(MARKDOWN_MARKERS)?,
        })
    }

    /// Build the service request for `request`.
    #[must_use]
    pub fn build_request(request: &ExchangeRequest<'_>) -> GenerationRequest {
        let contents = to_contents(request.history);
        if request.model.is_image_capable() {
            GenerationRequest {
                model: request.model.model_id().to_string(),
                contents,
                system_instruction: None,
                enable_search: false,
                thinking_budget: None,
                image_aspect_ratio: Some(IMAGE_ASPECT_RATIO.to_string()),
            }
        } else {
            GenerationRequest {
                model: request.model.model_id().to_string(),
                contents,
                system_instruction: Some(build_system_instruction(request.config)),
                enable_search: request.enable_search,
                thinking_budget: request.config.effective_thinking_budget(),
                image_aspect_ratio: None,
            }
        }
    }

    /// Execute one exchange, passing fragments to `on_fragment` in arrival order.
    ///
    /// On error the fragments already emitted stay emitted; nothing is retried.
    ///
    /// # Errors
    /// Returns the first transport or service error.
    pub async fn run<F>(
        &self,
        request: ExchangeRequest<'_>,
        on_fragment: F,
    ) -> ChatResult<ExchangeReport>
    where
        F: FnMut(Fragment) + Send,
    {
        let generation = Self::build_request(&request);
        let mut sink = FragmentSink::new(on_fragment);

        info!(
            "Starting exchange with {} ({} messages)",
            request.model.display_name(),
            generation.contents.len()
        );

        let result = if request.model.is_image_capable() {
            self.run_image(generation, &mut sink).await
        } else {
            self.run_streaming(generation, &mut sink).await
        };

        if let Err(e) = result {
            sink.phase = sink.phase.on_error();
            warn!("Exchange failed after {} fragments: {e}", sink.fragments);
            return Err(e);
        }

        sink.phase = sink.phase.on_close();
        debug!("Exchange done after {} fragments", sink.fragments);

        if request.config.text_to_speech && !sink.text.is_empty() {
            self.read_aloud(&sink.text, &request.config.voice_uri);
        }

        Ok(ExchangeReport {
            phase: sink.phase,
            text: sink.text,
            fragments: sink.fragments,
        })
    }

    async fn run_streaming<F>(
        &self,
        request: GenerationRequest,
        sink: &mut FragmentSink<F>,
    ) -> ChatResult<()>
    where
        F: FnMut(Fragment) + Send,
    {
        let mut stream = self.service.generate_stream(request).await?;
        while let Some(chunk) = stream.next().await {
            let mut chunk = chunk?;
            if let Some(metadata) = chunk.grounding.take() {
                sink.emit(Fragment::Metadata(metadata));
            }
            let text = chunk.text();
            if !text.is_empty() {
                sink.emit(Fragment::Text(text));
            }
        }
        Ok(())
    }

    async fn run_image<F>(
        &self,
        request: GenerationRequest,
        sink: &mut FragmentSink<F>,
    ) -> ChatResult<()>
    where
        F: FnMut(Fragment) + Send,
    {
        let GenerationResponse { parts, .. } = self.service.generate(request).await?;
        if parts.is_empty() {
            return Err(ChatError::EmptyResponse);
        }
        for part in parts {
            match part {
                Part::InlineData(image) => sink.emit(Fragment::Image(format_data_uri(
                    Some(&image.mime_type),
                    &image.data,
                ))),
                Part::Text(text) if !text.is_empty() => sink.emit(Fragment::Text(text)),
                Part::Text(_) => {}
            }
        }
        Ok(())
    }

    fn read_aloud(&self, text: &str, voice_id: &str) {
        let Some(speech) = self.speech.as_ref() else {
            debug!("Text-to-speech enabled but no synthesizer configured");
            return;
        };
        speak_detached(
            Arc::clone(speech),
            self.strip_markdown(text),
            voice_id.to_string(),
        );
    }

    /// Speak `text` now, markdown markers removed.
    ///
    /// # Errors
    /// Returns [`ChatError::Unsupported`] without a synthesizer, or the
    /// synthesizer's error if the utterance cannot start.
    pub async fn speak(&self, text: &str, voice_id: &str) -> ChatResult<()> {
        let speech = self
            .speech
            .as_ref()
            .ok_or_else(|| ChatError::Unsupported("speech synthesis".to_string()))?;
        speech.speak(&self.strip_markdown(text), voice_id).await
    }

    /// Stop the current utterance. Without a synthesizer there is nothing to stop.
    ///
    /// # Errors
    /// Returns the synthesizer's error.
    pub async fn stop_speaking(&self) -> ChatResult<()> {
        match self.speech.as_ref() {
            Some(speech) => speech.cancel().await,
            None => Ok(()),
        }
    }

    /// Strip markdown markers the way spoken text is prepared.
    #[must_use]
    pub fn strip_markdown(&self, text: &str) -> String {
        self.markdown.replace_all(text, "").into_owned()
    }
}

struct FragmentSink<F> {
    on_fragment: F,
    phase: ExchangePhase,
    text: String,
    fragments: usize,
}

impl<F: FnMut(Fragment)> FragmentSink<F> {
    const fn new(on_fragment: F) -> Self {
        Self {
            on_fragment,
            phase: ExchangePhase::Pending,
            text: String::new(),
            fragments: 0,
        }
    }

    fn emit(&mut self, fragment: Fragment) {
        if let Fragment::Text(text) = &fragment {
            self.text.push_str(text);
        }
        debug!("Fragment #{} ({})", self.fragments, fragment.kind());
        self.fragments += 1;
        self.phase = self.phase.on_fragment();
        (self.on_fragment)(fragment);
    }
}
