//! Configuration for the chat client.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::chat::core::errors::{ChatError, ChatResult};

/// Environment variable holding the generation API key.
const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Crate-specific override for the API key.
const LUMINA_API_KEY_ENV: &str = "LUMINA_API_KEY";
/// Environment variable for a custom generation endpoint.
const BASE_URL_ENV: &str = "LUMINA_BASE_URL";
/// Environment variable for the `SQLite` database path.
const DB_PATH_ENV: &str = "LUMINA_DB_PATH";
/// Environment variable for the HTTP port.
const PORT_ENV: &str = "LUMINA_PORT";
/// Environment variable for the text-to-speech program.
const TTS_PROGRAM_ENV: &str = "LUMINA_TTS_PROGRAM";
/// Environment variable for the default model.
const MODEL_ENV: &str = "LUMINA_MODEL";

/// Response tone.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Objective and polite.
    #[default]
    Professional,
    /// Friendly and conversational.
    Casual,
    /// Clever and slightly humorous.
    Witty,
    /// Strictly formal.
    Formal,
    /// Supportive.
    Empathetic,
}

/// Response length.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Length {
    /// Brief answers.
    Concise,
    /// Balanced answers.
    #[default]
    Standard,
    /// In-depth answers.
    Detailed,
}

/// Response complexity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    /// Beginner-friendly.
    Simple,
    /// Educated audience.
    #[default]
    Standard,
    /// Expert audience.
    Technical,
}

/// Models the client can talk to.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Fast everyday model.
    #[default]
    Flash,
    /// Reasoning model.
    Pro,
    /// Image generation model.
    Image,
}

impl ModelKind {
    /// Model identifier sent to the generation service.
    #[must_use]
    pub const fn model_id(self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash",
            Self::Pro => "gemini-3-pro-preview",
            Self::Image => "gemini-2.5-flash-image",
        }
    }

    /// Name shown to users.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Flash => "Krati Flash",
            Self::Pro => "Krati Pro 2.0",
            Self::Image => "Krati Vision",
        }
    }

    /// Short name used in configuration and requests.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Flash => "flash",
            Self::Pro => "pro",
            Self::Image => "image",
        }
    }

    /// Whether the model produces images instead of a text stream.
    #[must_use]
    pub const fn is_image_capable(self) -> bool {
        matches!(self, Self::Image)
    }

    /// Parse a short name (`flash`, `pro`, `image`) or a full model id.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [Self::Flash, Self::Pro, Self::Image]
            .into_iter()
            .find(|kind| {
                value.eq_ignore_ascii_case(kind.model_id())
                    || value.eq_ignore_ascii_case(kind.short_name())
            })
    }
}

/// User-editable response settings. Replaced wholesale on edit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Response tone.
    pub tone: Tone,
    /// Response length.
    pub length: Length,
    /// Response complexity.
    pub complexity: Complexity,
    /// Maximum number of retained sessions.
    pub history_limit: usize,
    /// Speak finished responses aloud.
    pub text_to_speech: bool,
    /// Preferred voice identifier; empty selects the host default.
    #[serde(rename = "voiceURI", alias = "voiceUri")]
    pub voice_uri: String,
    /// Reasoning token allowance; `None` or `0` disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    /// Extra persona instructions appended to the system instruction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_system_instruction: Option<String>,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            tone: Tone::default(),
            length: Length::default(),
            complexity: Complexity::default(),
            history_limit: 20,
            text_to_speech: false,
            voice_uri: String::new(),
            thinking_budget: None,
            custom_system_instruction: None,
        }
    }
}

impl ResponseConfig {
    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if `history_limit` is zero.
    pub fn validate(&self) -> ChatResult<()> {
        if self.history_limit == 0 {
            return Err(ChatError::InvalidConfig(
                "history_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Reasoning budget to request, only when positive.
    #[must_use]
    pub fn effective_thinking_budget(&self) -> Option<u32> {
        self.thinking_budget.filter(|budget| *budget > 0)
    }
}

/// Generation service connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key; required before the client can be built.
    pub api_key: Option<String>,
    /// Service base URL.
    pub base_url: String,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds for non-streaming calls.
    pub request_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl GeminiConfig {
    /// Connection timeout.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Storage settings for persisted sessions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// `SQLite` database path.
    pub sqlite_path: PathBuf,
    /// Key-value table name.
    pub table: String,
    /// Key under which the session list is stored.
    pub sessions_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("lumina.sqlite"),
            table: "kv_store".to_string(),
            sessions_key: "lumina_chat_history".to_string(),
        }
    }
}

/// HTTP shell settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listening port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

/// Text-to-speech settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// External program used to speak text.
    pub program: String,
    /// Arguments passed before the voice selection, e.g. `["-s", "160"]`.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            program: "espeak".to_string(),
            args: Vec::new(),
        }
    }
}

/// Top-level configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation service settings.
    pub gemini: GeminiConfig,
    /// Storage settings.
    pub storage: StorageConfig,
    /// HTTP shell settings.
    pub server: ServerConfig,
    /// Speech settings.
    pub speech: SpeechConfig,
    /// Initial response settings.
    pub response: ResponseConfig,
    /// Model used when a request does not name one.
    pub default_model: ModelKind,
}

impl AppConfig {
    /// Build the default configuration overridden by environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.gemini.api_key = std::env::var(LUMINA_API_KEY_ENV)
            .or_else(|_| std::env::var(API_KEY_ENV))
            .ok()
            .filter(|key| !key.trim().is_empty());
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            config.gemini.base_url = url;
        }
        if let Ok(path) = std::env::var(DB_PATH_ENV) {
            config.storage.sqlite_path = PathBuf::from(path);
        }
        if let Some(port) = std::env::var(PORT_ENV).ok().and_then(|p| p.parse().ok()) {
            config.server.port = port;
        }
        if let Ok(program) = std::env::var(TTS_PROGRAM_ENV) {
            config.speech.program = program;
        }
        if let Some(model) = std::env::var(MODEL_ENV)
            .ok()
            .and_then(|m| ModelKind::parse(&m))
        {
            config.default_model = model;
        }

        config
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> ChatResult<()> {
        self.response.validate()?;
        Url::parse(&self.gemini.base_url)?;

        if self.storage.table.is_empty()
            || !self
                .storage
                .table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ChatError::InvalidConfig(
                "storage.table must be a non-empty identifier".to_string(),
            ));
        }

        if self.storage.sessions_key.is_empty() {
            return Err(ChatError::InvalidConfig(
                "storage.sessions_key must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
