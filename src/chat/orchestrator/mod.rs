//! Request/response exchange with the generation service.

pub mod exchange;
pub mod outbound;
pub mod prompt;

pub use exchange::{ExchangeReport, ExchangeRequest, IMAGE_ASPECT_RATIO, ResponseOrchestrator};
pub use outbound::to_contents;
pub use prompt::{PERSONA_PREAMBLE, build_system_instruction};
