//! Conversation controller: active transcript, session list and the
//! single in-flight exchange.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use crate::chat::core::config::{ModelKind, ResponseConfig};
use crate::chat::core::errors::ChatResult;
use crate::chat::core::ids::{MessageId, SessionId};
use crate::chat::core::message::Message;
use crate::chat::core::session::{Session, enforce_history_limit};
use crate::chat::orchestrator::exchange::{ExchangeRequest, ResponseOrchestrator};
use crate::chat::storage::session_store::SessionStore;
use crate::chat::stream::accumulator::{apply_completion, apply_failure, apply_fragment};
use crate::chat::stream::fragment::Fragment;

/// Result of [`ConversationController::send`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    /// Nothing to send, or another exchange is in flight.
    Ignored,
    /// The exchange closed normally.
    Completed,
    /// The exchange failed; the error notice was appended.
    Failed,
}

#[derive(Debug)]
struct ControllerState {
    messages: Vec<Message>,
    sessions: Vec<Session>,
    active: Option<SessionId>,
    config: ResponseConfig,
    model: ModelKind,
    enable_search: bool,
}

impl ControllerState {
    /// Copy the live transcript into the active session entry.
    fn sync_active(&mut self) {
        let Some(active) = self.active else {
            return;
        };
        if let Some(session) = self.sessions.iter_mut().find(|s| s.id == active) {
            session.messages.clone_from(&self.messages);
        }
    }

    /// Messages of the exchange's session: the live transcript while it is
    /// active, the stored copy once the user switched away.
    fn target_messages(&mut self, session_id: SessionId) -> Option<&mut Vec<Message>> {
        if self.active == Some(session_id) {
            return Some(&mut self.messages);
        }
        self.sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .map(|s| &mut s.messages)
    }

    fn clear_active(&mut self) {
        self.active = None;
        self.messages.clear();
    }
}

/// Clears the in-flight flag when the exchange settles or is dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// What `send` needs once the lock is released.
struct PreparedExchange {
    session_id: SessionId,
    placeholder_id: MessageId,
    history: Vec<Message>,
    config: ResponseConfig,
    model: ModelKind,
    enable_search: bool,
}

/// Spoken by [`ConversationController::preview_voice`].
pub const VOICE_PREVIEW_TEXT: &str = "Hello, I am Lumina. This is my voice.";

/// Owns the conversation state and drives exchanges.
pub struct ConversationController {
    orchestrator: ResponseOrchestrator,
    store: SessionStore,
    state: Mutex<ControllerState>,
    /// Serializes store writes; each write snapshots the state it holds.
    writer: tokio::sync::Mutex<()>,
    in_flight: AtomicBool,
}

impl ConversationController {
    /// Load persisted sessions and apply the history limit.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid.
    pub async fn open(
        orchestrator: ResponseOrchestrator,
        store: SessionStore,
        config: ResponseConfig,
        model: ModelKind,
    ) -> ChatResult<Self> {
        config.validate()?;

        let mut sessions = store.load().await;
        let evicted = enforce_history_limit(&mut sessions, config.history_limit);
        if evicted > 0 {
            info!("Evicted {evicted} sessions over the history limit");
            store.save(&sessions).await;
        }
        info!("Opened conversation controller with {} sessions", sessions.len());

        Ok(Self {
            orchestrator,
            store,
            state: Mutex::new(ControllerState {
                messages: Vec::new(),
                sessions,
                active: None,
                config,
                model,
                enable_search: false,
            }),
            writer: tokio::sync::Mutex::new(()),
            in_flight: AtomicBool::new(false),
        })
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the current session list. The snapshot is taken after the
    /// writer lock is acquired, so the last write always holds the latest state.
    async fn persist(&self) {
        let _writer = self.writer.lock().await;
        let snapshot = self.state().sessions.clone();
        self.store.save(&snapshot).await;
    }

    /// Send a user message and run one exchange to completion.
    ///
    /// Blank text without an image, or a call while another exchange is in
    /// flight, returns [`SendOutcome::Ignored`] without touching state.
    pub async fn send(&self, text: &str, image: Option<String>) -> SendOutcome {
        if text.trim().is_empty() && image.is_none() {
            return SendOutcome::Ignored;
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            debug!("Send ignored: an exchange is already in flight");
            return SendOutcome::Ignored;
        };

        let prepared = self.prepare(text, image);
        self.persist().await;

        let session_id = prepared.session_id;
        let placeholder_id = prepared.placeholder_id;
        let result = self
            .orchestrator
            .run(
                ExchangeRequest {
                    history: &prepared.history,
                    model: prepared.model,
                    enable_search: prepared.enable_search,
                    config: &prepared.config,
                },
                |fragment| self.route_fragment(session_id, placeholder_id, fragment),
            )
            .await;

        let outcome = if result.is_ok() {
            SendOutcome::Completed
        } else {
            SendOutcome::Failed
        };
        self.settle(session_id, placeholder_id, outcome);
        self.persist().await;
        outcome
    }

    fn prepare(&self, text: &str, image: Option<String>) -> PreparedExchange {
        let mut state = self.state();

        let user = Message::user(text, image);
        let history_len = state.messages.len() + 1;
        state.messages.push(user.clone());

        let active = state.active;
        let session_id = match active {
            Some(id) if state.sessions.iter().any(|s| s.id == id) => id,
            _ => {
                let session = Session::start(user);
                let id = session.id;
                info!("Created session {id} '{}'", session.title);
                state.sessions.insert(0, session);
                let limit = state.config.history_limit;
                let evicted = enforce_history_limit(&mut state.sessions, limit);
                if evicted > 0 {
                    info!("Evicted {evicted} sessions over the history limit");
                }
                state.active = Some(id);
                id
            }
        };

        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id;
        state.messages.push(placeholder);
        state.sync_active();

        PreparedExchange {
            session_id,
            placeholder_id,
            history: state.messages[..history_len].to_vec(),
            config: state.config.clone(),
            model: state.model,
            enable_search: state.enable_search,
        }
    }

    fn route_fragment(&self, session_id: SessionId, placeholder_id: MessageId, fragment: Fragment) {
        let mut state = self.state();
        match state.target_messages(session_id) {
            Some(messages) => {
                apply_fragment(messages, placeholder_id, fragment);
            }
            None => debug!("Session {session_id} is gone; dropping {} fragment", fragment.kind()),
        }
    }

    fn settle(
        &self,
        session_id: SessionId,
        placeholder_id: MessageId,
        outcome: SendOutcome,
    ) {
        let mut state = self.state();
        if let Some(messages) = state.target_messages(session_id) {
            if outcome == SendOutcome::Failed {
                apply_failure(messages, placeholder_id);
            } else {
                apply_completion(messages, placeholder_id);
            }
        }
        state.sync_active();
    }

    /// Leave the active session; it stays in the list.
    pub fn new_chat(&self) {
        let mut state = self.state();
        state.sync_active();
        state.clear_active();
        debug!("Started a new chat");
    }

    /// Make `id` the active session. Returns `false` and changes nothing if
    /// it does not exist.
    pub fn select_chat(&self, id: SessionId) -> bool {
        let mut state = self.state();
        let Some(messages) = state
            .sessions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.messages.clone())
        else {
            debug!("Select ignored: unknown session {id}");
            return false;
        };
        state.sync_active();
        state.messages = messages;
        state.active = Some(id);
        true
    }

    /// Remove a session and persist. Deleting the active session starts a new chat.
    pub async fn delete_chat(&self, id: SessionId) -> bool {
        {
            let mut state = self.state();
            let before = state.sessions.len();
            state.sessions.retain(|s| s.id != id);
            if state.sessions.len() == before {
                return false;
            }
            if state.active == Some(id) {
                state.clear_active();
            }
        }
        info!("Deleted session {id}");
        self.persist().await;
        true
    }

    /// Replace the response settings; evicts and persists when the history
    /// limit now excludes sessions.
    ///
    /// # Errors
    /// Returns an error if `config` is invalid; nothing changes in that case.
    pub async fn update_config(&self, config: ResponseConfig) -> ChatResult<()> {
        config.validate()?;
        let evicted = {
            let mut state = self.state();
            state.sync_active();
            let evicted = enforce_history_limit(&mut state.sessions, config.history_limit);
            state.config = config;
            if evicted > 0 {
                info!("Evicted {evicted} sessions after history limit change");
                let active = state.active;
                if active.is_some_and(|id| !state.sessions.iter().any(|s| s.id == id)) {
                    state.clear_active();
                }
            }
            evicted
        };
        if evicted > 0 {
            self.persist().await;
        }
        Ok(())
    }

    /// Read a message of the active transcript aloud with the configured
    /// voice. Returns `false` if the message is not in the active transcript.
    ///
    /// # Errors
    /// Returns an error if speech synthesis is unavailable or fails to start.
    pub async fn speak_message(&self, id: MessageId) -> ChatResult<bool> {
        let (content, voice) = {
            let state = self.state();
            let Some(message) = state.messages.iter().find(|m| m.id == id) else {
                debug!("Speak ignored: unknown message {id}");
                return Ok(false);
            };
            (message.content.clone(), state.config.voice_uri.clone())
        };
        self.orchestrator.speak(&content, &voice).await?;
        Ok(true)
    }

    /// Stop whatever is being read aloud.
    ///
    /// # Errors
    /// Returns an error if the synthesizer fails to stop.
    pub async fn stop_speaking(&self) -> ChatResult<()> {
        self.orchestrator.stop_speaking().await
    }

    /// Speak a short sample with `voice_id`.
    ///
    /// # Errors
    /// Returns an error if speech synthesis is unavailable or fails to start.
    pub async fn preview_voice(&self, voice_id: &str) -> ChatResult<()> {
        self.orchestrator.speak(VOICE_PREVIEW_TEXT, voice_id).await
    }

    /// Select the model for the next exchange.
    pub fn set_model(&self, model: ModelKind) {
        self.state().model = model;
    }

    /// Toggle web-search grounding for the next exchange.
    pub fn set_search(&self, enabled: bool) {
        self.state().enable_search = enabled;
    }

    /// Active transcript.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// All sessions, newest first.
    #[must_use]
    pub fn sessions(&self) -> Vec<Session> {
        self.state().sessions.clone()
    }

    /// Active session id, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.state().active
    }

    /// Current response settings.
    #[must_use]
    pub fn config(&self) -> ResponseConfig {
        self.state().config.clone()
    }

    /// Selected model.
    #[must_use]
    pub fn model(&self) -> ModelKind {
        self.state().model
    }

    /// Whether web search is requested.
    #[must_use]
    pub fn search_enabled(&self) -> bool {
        self.state().enable_search
    }

    /// Whether an exchange is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use tokio::sync::oneshot;

    use super::*;
    use crate::chat::core::errors::ChatError;
    use crate::chat::core::message::Role;
    use crate::chat::core::session::DEFAULT_TITLE;
    use crate::chat::storage::kv_store::{KeyValueStore, MemoryKeyValueStore, StoreFuture};
    use crate::chat::stream::accumulator::ERROR_NOTICE;
    use crate::llm::service::{
        GenerationFuture, GenerationRequest, GenerationResponse, GenerationService, Part,
        ResponseStream,
    };
    use crate::voice::synthesis::{SpeechFuture, SpeechSynthesizer, Voice};

    const KEY: &str = "lumina_chat_history";

    fn text_chunk(text: &str) -> GenerationResponse {
        GenerationResponse {
            parts: vec![Part::Text(text.to_string())],
            grounding: None,
        }
    }

    /// Streams canned chunks, optionally failing at the end.
    struct CannedService {
        chunks: Vec<&'static str>,
        fail: bool,
    }

    impl GenerationService for CannedService {
        fn generate(
            &self,
            _request: GenerationRequest,
        ) -> GenerationFuture<'_, ChatResult<GenerationResponse>> {
            Box::pin(async { Err(ChatError::EmptyResponse) })
        }

        fn generate_stream(
            &self,
            _request: GenerationRequest,
        ) -> GenerationFuture<'_, ChatResult<ResponseStream>> {
            let mut items: Vec<ChatResult<GenerationResponse>> =
                self.chunks.iter().map(|c| Ok(text_chunk(c))).collect();
            if self.fail {
                items.push(Err(ChatError::Stream("connection reset".to_string())));
            }
            Box::pin(async move {
                let stream: ResponseStream = Box::pin(futures::stream::iter(items));
                Ok(stream)
            })
        }
    }

    /// Holds its single chunk until the test releases the gate.
    struct GatedService {
        gate: Mutex<Option<oneshot::Receiver<()>>>,
    }

    impl GatedService {
        fn new() -> (Self, oneshot::Sender<()>) {
            let (tx, rx) = oneshot::channel();
            (
                Self {
                    gate: Mutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    impl GenerationService for GatedService {
        fn generate(
            &self,
            _request: GenerationRequest,
        ) -> GenerationFuture<'_, ChatResult<GenerationResponse>> {
            Box::pin(async { Err(ChatError::EmptyResponse) })
        }

        fn generate_stream(
            &self,
            _request: GenerationRequest,
        ) -> GenerationFuture<'_, ChatResult<ResponseStream>> {
            let gate = self.gate.lock().unwrap().take();
            Box::pin(async move {
                let stream: ResponseStream = Box::pin(futures::stream::once(async move {
                    if let Some(gate) = gate {
                        let _ = gate.await;
                    }
                    Ok(text_chunk("late answer"))
                }));
                Ok(stream)
            })
        }
    }

    /// Memory store whose first write waits until the test releases it.
    struct GatedStore {
        inner: MemoryKeyValueStore,
        gate: Mutex<Option<oneshot::Receiver<()>>>,
        entered: AtomicBool,
    }

    impl KeyValueStore for GatedStore {
        fn get_item(&self, key: &str) -> StoreFuture<'_, ChatResult<Option<String>>> {
            self.inner.get_item(key)
        }

        fn set_item(&self, key: &str, value: String) -> StoreFuture<'_, ChatResult<()>> {
            let gate = self.gate.lock().unwrap().take();
            let write = self.inner.set_item(key, value);
            Box::pin(async move {
                if let Some(gate) = gate {
                    self.entered.store(true, Ordering::Release);
                    let _ = gate.await;
                }
                write.await
            })
        }
    }

    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Mutex<Vec<(String, String)>>,
        cancels: Mutex<usize>,
    }

    impl SpeechSynthesizer for RecordingSpeech {
        fn list_voices(&self) -> SpeechFuture<'_, ChatResult<Vec<Voice>>> {
            Box::pin(async { Ok(Vec::new()) })
        }

        fn speak<'a>(
            &'a self,
            text: &'a str,
            voice_id: &'a str,
        ) -> SpeechFuture<'a, ChatResult<()>> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), voice_id.to_string()));
            Box::pin(async { Ok(()) })
        }

        fn cancel(&self) -> SpeechFuture<'_, ChatResult<()>> {
            *self.cancels.lock().unwrap() += 1;
            Box::pin(async { Ok(()) })
        }
    }

    async fn open_with(
        orchestrator: ResponseOrchestrator,
        backend: Arc<dyn KeyValueStore>,
        config: ResponseConfig,
    ) -> ConversationController {
        let store = SessionStore::new(backend, KEY);
        ConversationController::open(orchestrator, store, config, ModelKind::Flash)
            .await
            .unwrap()
    }

    async fn controller_with(
        service: Arc<dyn GenerationService>,
        backend: Arc<MemoryKeyValueStore>,
        config: ResponseConfig,
    ) -> ConversationController {
        let orchestrator = ResponseOrchestrator::new(service, None).unwrap();
        open_with(orchestrator, backend, config).await
    }

    async fn persisted(backend: &MemoryKeyValueStore) -> Vec<Session> {
        let raw = backend.get_item(KEY).await.unwrap().unwrap_or_default();
        serde_json::from_str(&raw).unwrap_or_default()
    }

    async fn seed_sessions(backend: &MemoryKeyValueStore, count: i64) -> Vec<Session> {
        let sessions: Vec<Session> = (0..count)
            .map(|i| {
                let mut session = Session::start(Message::user(format!("chat {i}"), None));
                session.created_at = Utc::now() - Duration::minutes(count - i);
                session
            })
            .collect();
        let raw = serde_json::to_string(&sessions).unwrap();
        backend.set_item(KEY, raw).await.unwrap();
        sessions
    }

    async fn wait_persisted(backend: &MemoryKeyValueStore, count: usize) {
        for _ in 0..1000 {
            if persisted(backend).await.len() == count {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("store never reached {count} sessions");
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..1000 {
            if condition() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition never became true");
    }

    #[tokio::test]
    async fn test_blank_send_is_ignored() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec!["x"],
            fail: false,
        });
        let controller = controller_with(service, backend, ResponseConfig::default()).await;

        assert_eq!(controller.send("   \n", None).await, SendOutcome::Ignored);
        assert!(controller.messages().is_empty());
        assert!(controller.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_first_send_creates_session() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec!["Hello", ", world"],
            fail: false,
        });
        let controller = controller_with(service, backend.clone(), ResponseConfig::default()).await;

        let outcome = controller
            .send("Explain quantum entanglement in simple terms please", None)
            .await;
        assert_eq!(outcome, SendOutcome::Completed);

        let sessions = controller.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Explain quantum entanglement i...");
        assert_eq!(controller.active_session(), Some(sessions[0].id));

        let messages = controller.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].role, Role::Model);
        assert_eq!(messages[1].content, "Hello, world");
        assert!(!messages[1].is_thinking);

        let stored = persisted(&backend).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].messages, messages);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_image_only_send_uses_placeholder_title() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec!["A cat."],
            fail: false,
        });
        let controller = controller_with(service, backend, ResponseConfig::default()).await;

        let outcome = controller
            .send("", Some("data:image/png;base64,AA==".to_string()))
            .await;
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(controller.sessions()[0].title, DEFAULT_TITLE);
    }

    #[tokio::test]
    async fn test_placeholder_visible_while_in_flight_and_second_send_ignored() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let (service, release) = GatedService::new();
        let controller = Arc::new(
            controller_with(Arc::new(service), backend.clone(), ResponseConfig::default()).await,
        );

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.send("Hi", None).await })
        };
        wait_until(|| controller.messages().len() == 2).await;

        let sessions = controller.sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].title, "Hi");
        assert_eq!(sessions[0].messages.len(), 2);
        assert!(controller.messages()[1].is_thinking);
        assert!(controller.is_busy());
        wait_persisted(&backend, 1).await;

        assert_eq!(controller.send("again", None).await, SendOutcome::Ignored);
        assert_eq!(controller.messages().len(), 2);

        let _ = release.send(());
        let outcome = first.await.unwrap();
        assert_eq!(outcome, SendOutcome::Completed);
        assert_eq!(controller.messages()[1].content, "late answer");
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_failure_mid_stream_appends_notice() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec!["first ", "second"],
            fail: true,
        });
        let controller = controller_with(service, backend.clone(), ResponseConfig::default()).await;

        assert_eq!(controller.send("Hi", None).await, SendOutcome::Failed);

        let messages = controller.messages();
        assert_eq!(messages[1].content, format!("first second{ERROR_NOTICE}"));
        assert!(!messages[1].is_thinking);
        assert_eq!(persisted(&backend).await[0].messages[1].content, messages[1].content);
        assert!(!controller.is_busy());
    }

    #[tokio::test]
    async fn test_fragments_follow_session_after_switching_away() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let (service, release) = GatedService::new();
        let controller = Arc::new(
            controller_with(Arc::new(service), backend.clone(), ResponseConfig::default()).await,
        );

        let first = {
            let controller = Arc::clone(&controller);
            tokio::spawn(async move { controller.send("Hi", None).await })
        };
        wait_until(|| controller.messages().len() == 2).await;
        let session_id = controller.active_session();

        controller.new_chat();
        assert!(controller.messages().is_empty());
        assert_eq!(controller.active_session(), None);

        let _ = release.send(());
        let _ = first.await;

        assert!(controller.messages().is_empty());
        let sessions = controller.sessions();
        assert_eq!(Some(sessions[0].id), session_id);
        assert_eq!(sessions[0].messages[1].content, "late answer");
        assert_eq!(persisted(&backend).await[0].messages[1].content, "late answer");
    }

    #[tokio::test]
    async fn test_follow_up_send_reuses_session() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec!["ok"],
            fail: false,
        });
        let controller = controller_with(service, backend, ResponseConfig::default()).await;

        controller.send("one", None).await;
        controller.send("two", None).await;

        assert_eq!(controller.sessions().len(), 1);
        assert_eq!(controller.messages().len(), 4);
        assert_eq!(controller.sessions()[0].title, "one");
    }

    #[tokio::test]
    async fn test_select_and_delete_chat() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let seeded = seed_sessions(&backend, 3).await;
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let controller = controller_with(service, backend.clone(), ResponseConfig::default()).await;

        assert!(!controller.select_chat(SessionId::new()));
        assert_eq!(controller.active_session(), None);

        let target = seeded[1].id;
        assert!(controller.select_chat(target));
        assert_eq!(controller.active_session(), Some(target));
        assert_eq!(controller.messages(), seeded[1].messages);

        assert!(controller.delete_chat(target).await);
        assert_eq!(controller.active_session(), None);
        assert!(controller.messages().is_empty());
        assert_eq!(persisted(&backend).await.len(), 2);
        assert!(!controller.delete_chat(target).await);
    }

    #[tokio::test]
    async fn test_open_evicts_over_limit() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        seed_sessions(&backend, 25).await;
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let controller = controller_with(service, backend.clone(), ResponseConfig::default()).await;

        assert_eq!(controller.sessions().len(), 20);
        assert_eq!(persisted(&backend).await.len(), 20);
    }

    #[tokio::test]
    async fn test_lowering_history_limit_evicts_oldest() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let seeded = seed_sessions(&backend, 25).await;
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let config = ResponseConfig {
            history_limit: 50,
            ..ResponseConfig::default()
        };
        let controller = controller_with(service, backend.clone(), config).await;
        assert_eq!(controller.sessions().len(), 25);

        let lowered = ResponseConfig {
            history_limit: 20,
            ..ResponseConfig::default()
        };
        assert!(controller.update_config(lowered).await.is_ok());

        let mut expected: Vec<SessionId> = seeded.iter().rev().take(20).map(|s| s.id).collect();
        let kept: Vec<SessionId> = controller.sessions().iter().map(|s| s.id).collect();
        assert_eq!(kept, expected);

        let mut stored: Vec<SessionId> = persisted(&backend).await.iter().map(|s| s.id).collect();
        stored.sort();
        expected.sort();
        assert_eq!(stored, expected);
        assert_eq!(controller.config().history_limit, 20);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let controller = controller_with(service, backend, ResponseConfig::default()).await;
        let bad = ResponseConfig {
            history_limit: 0,
            ..ResponseConfig::default()
        };
        assert!(controller.update_config(bad).await.is_err());
        assert_eq!(controller.config().history_limit, 20);
    }

    #[tokio::test]
    async fn test_model_and_search_settings() {
        let backend = Arc::new(MemoryKeyValueStore::new());
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let controller = controller_with(service, backend, ResponseConfig::default()).await;
        assert_eq!(controller.model(), ModelKind::Flash);
        controller.set_model(ModelKind::Pro);
        controller.set_search(true);
        assert_eq!(controller.model(), ModelKind::Pro);
        assert!(controller.search_enabled());
    }

    #[tokio::test]
    async fn test_delete_during_pending_write_is_not_undone() {
        let memory = MemoryKeyValueStore::new();
        let seeded = seed_sessions(&memory, 2).await;
        let (release, gate) = oneshot::channel();
        let backend = Arc::new(GatedStore {
            inner: memory,
            gate: Mutex::new(Some(gate)),
            entered: AtomicBool::new(false),
        });
        let service = Arc::new(CannedService {
            chunks: vec![],
            fail: false,
        });
        let orchestrator = ResponseOrchestrator::new(service, None).unwrap();
        let controller =
            Arc::new(open_with(orchestrator, backend.clone(), ResponseConfig::default()).await);

        let first = {
            let controller = Arc::clone(&controller);
            let id = seeded[0].id;
            tokio::spawn(async move { controller.delete_chat(id).await })
        };
        wait_until(|| backend.entered.load(Ordering::Acquire)).await;

        let second = {
            let controller = Arc::clone(&controller);
            let id = seeded[1].id;
            tokio::spawn(async move { controller.delete_chat(id).await })
        };
        wait_until(|| controller.sessions().is_empty()).await;

        release.send(()).unwrap();
        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert!(persisted(&backend.inner).await.is_empty());
    }

    #[tokio::test]
    async fn test_read_aloud_stop_and_preview() {
        let speech = Arc::new(RecordingSpeech::default());
        let service = Arc::new(CannedService {
            chunks: vec!["**Hello** there"],
            fail: false,
        });
        let orchestrator = ResponseOrchestrator::new(service, Some(speech.clone())).unwrap();
        let config = ResponseConfig {
            voice_uri: "en-gb".to_string(),
            ..ResponseConfig::default()
        };
        let controller =
            open_with(orchestrator, Arc::new(MemoryKeyValueStore::new()), config).await;

        assert_eq!(controller.send("Hi", None).await, SendOutcome::Completed);
        let reply = controller.messages()[1].id;

        assert!(controller.speak_message(reply).await.unwrap());
        assert!(!controller.speak_message(MessageId::new()).await.unwrap());
        controller.preview_voice("fr").await.unwrap();
        controller.stop_speaking().await.unwrap();

        assert_eq!(
            *speech.spoken.lock().unwrap(),
            vec![
                ("Hello there".to_string(), "en-gb".to_string()),
                (VOICE_PREVIEW_TEXT.to_string(), "fr".to_string()),
            ]
        );
        assert_eq!(*speech.cancels.lock().unwrap(), 1);
    }
}
