//! Application state shared across all request handlers.

use std::sync::Arc;

use tracing::info;

use crate::chat::controller::ConversationController;
use crate::chat::core::config::AppConfig;
use crate::chat::core::errors::ChatResult;
use crate::chat::orchestrator::ResponseOrchestrator;
use crate::chat::storage::{SessionStore, SqliteKeyValueStore};
use crate::llm::GeminiClient;
use crate::voice::{CommandSpeech, SpeechSynthesizer};

/// Shared application state.
pub struct AppState {
    /// Conversation controller.
    pub controller: ConversationController,
    /// Speech synthesizer used for voice listing.
    pub speech: Arc<dyn SpeechSynthesizer>,
}

impl AppState {
    /// Build the state from configuration: Gemini client, `SQLite` store,
    /// speech program and controller.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or a collaborator
    /// cannot be created.
    pub async fn new(config: &AppConfig) -> ChatResult<Arc<Self>> {
        config.validate()?;

        let service = Arc::new(GeminiClient::new(&config.gemini)?);
        let speech: Arc<dyn SpeechSynthesizer> = Arc::new(CommandSpeech::new(&config.speech));

        let backend = Arc::new(SqliteKeyValueStore::new(&config.storage).await?);
        let store = SessionStore::new(backend, config.storage.sessions_key.clone());
        info!(
            "Sessions stored in {} under '{}'",
            config.storage.sqlite_path.display(),
            config.storage.sessions_key
        );

        let orchestrator = ResponseOrchestrator::new(service, Some(Arc::clone(&speech)))?;
        let controller = ConversationController::open(
            orchestrator,
            store,
            config.response.clone(),
            config.default_model,
        )
        .await?;

        Ok(Self::from_parts(controller, speech))
    }

    /// Wrap already-built collaborators.
    #[must_use]
    pub fn from_parts(
        controller: ConversationController,
        speech: Arc<dyn SpeechSynthesizer>,
    ) -> Arc<Self> {
        Arc::new(Self { controller, speech })
    }
}
