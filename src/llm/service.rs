//! Generation service abstraction.
//!
//! The orchestrator only sees this trait; the HTTP client in
//! [`crate::llm::gemini`] is one implementation, test doubles are another.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;

use crate::chat::core::data_uri::InlineImage;
use crate::chat::core::errors::ChatResult;
use crate::chat::core::message::{GroundingMetadata, Role};

/// Boxed future type for generation calls.
pub type GenerationFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Lazy, single-pass sequence of partial responses.
pub type ResponseStream = Pin<Box<dyn Stream<Item = ChatResult<GenerationResponse>> + Send>>;

/// One typed part of a message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Part {
    /// Plain text.
    Text(String),
    /// Inline binary payload (base64).
    InlineData(InlineImage),
}

/// A role-tagged list of parts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Content {
    /// Author role.
    pub role: Role,
    /// Parts in order.
    pub parts: Vec<Part>,
}

/// Everything the service needs for one call.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GenerationRequest {
    /// Model identifier.
    pub model: String,
    /// Conversation so far, oldest first.
    pub contents: Vec<Content>,
    /// Optional system instruction.
    pub system_instruction: Option<String>,
    /// Activate the web search tool.
    pub enable_search: bool,
    /// Optional reasoning budget in tokens.
    pub thinking_budget: Option<u32>,
    /// Aspect ratio for image generation, e.g. `1:1`.
    pub image_aspect_ratio: Option<String>,
}

/// A full response or one partial response of a stream.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct GenerationResponse {
    /// Parts of the first candidate.
    pub parts: Vec<Part>,
    /// Grounding sources attached to this response, if any.
    pub grounding: Option<GroundingMetadata>,
}

impl GenerationResponse {
    /// Concatenated text of all text parts.
    #[must_use]
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::InlineData(_) => None,
            })
            .collect()
    }
}

/// External generation collaborator.
pub trait GenerationService: Send + Sync {
    /// Issue a single non-streaming call.
    ///
    /// # Errors
    /// Returns an error on transport failure or a non-success response.
    fn generate(
        &self,
        request: GenerationRequest,
    ) -> GenerationFuture<'_, ChatResult<GenerationResponse>>;

    /// Open a streamed call. Items after the first error are never produced.
    ///
    /// # Errors
    /// Returns an error if the call cannot be opened.
    fn generate_stream(
        &self,
        request: GenerationRequest,
    ) -> GenerationFuture<'_, ChatResult<ResponseStream>>;
}
