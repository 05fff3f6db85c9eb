//! Generation service collaborator and its Gemini implementation.

pub mod gemini;
pub mod service;
mod wire;

pub use gemini::GeminiClient;
pub use service::{
    Content, GenerationFuture, GenerationRequest, GenerationResponse, GenerationService, Part,
    ResponseStream,
};
