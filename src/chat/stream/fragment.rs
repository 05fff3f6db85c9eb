//! Incremental response fragments and the per-exchange state machine.

use serde::Serialize;

use crate::chat::core::message::GroundingMetadata;

/// One incremental unit of a response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragment {
    /// Text to append.
    Text(String),
    /// Grounding sources; replaces any previous ones.
    Metadata(GroundingMetadata),
    /// A whole generated image as a data URI.
    Image(String),
}

impl Fragment {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Metadata(_) => "metadata",
            Self::Image(_) => "image",
        }
    }
}

/// Lifecycle of a single exchange.
///
/// `Pending -> Streaming -> Done` on a clean close, `Pending | Streaming ->
/// Failed` on error. `Done` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangePhase {
    /// Placeholder appended, nothing received yet.
    #[default]
    Pending,
    /// At least one fragment applied.
    Streaming,
    /// Collaborator closed the response normally.
    Done,
    /// Transport or service failure.
    Failed,
}

impl ExchangePhase {
    /// Phase after a fragment is applied.
    #[must_use]
    pub const fn on_fragment(self) -> Self {
        match self {
            Self::Pending => Self::Streaming,
            other => other,
        }
    }

    /// Phase after the collaborator closes the response.
    #[must_use]
    pub const fn on_close(self) -> Self {
        match self {
            Self::Pending | Self::Streaming => Self::Done,
            other => other,
        }
    }

    /// Phase after a failure.
    #[must_use]
    pub const fn on_error(self) -> Self {
        match self {
            Self::Pending | Self::Streaming => Self::Failed,
            other => other,
        }
    }

    /// Whether the exchange has settled.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}
