//! Session facade.
//!
//! [`ClassroomSession`] wires the store, audio sequencer, dispatcher, and
//! connection manager together for one live session and exposes the handful
//! of operations a frontend needs: send a turn, inject chaos, end, shut down.

use std::sync::Arc;

use tracing::{info, warn};

use teachlab_api::{ApiClient, ChaosInjection, SessionReport};
use teachlab_core::roster::{StudentId, StudentPatch};
use teachlab_core::session::{ConversationEntry, SessionConfig, Speaker};
use teachlab_settings::TeachLabSettings;

use crate::audio::{AudioHandle, AudioSequencer, AudioSink};
use crate::connection::ConnectionManager;
use crate::dispatch::Dispatcher;
use crate::errors::Result;
use crate::store::SessionStore;

/// One live classroom session.
pub struct ClassroomSession {
    store: Arc<SessionStore>,
    api: ApiClient,
    connection: ConnectionManager,
    sequencer: AudioSequencer,
}

impl ClassroomSession {
    /// Create a session on the server, mark the local store active, and
    /// bring up the stream and the audio queue.
    pub async fn begin(
        settings: &TeachLabSettings,
        config: SessionConfig,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self> {
        let api = ApiClient::from_settings(&settings.api);
        let created = api.create_session(&config).await?;
        info!(session_id = %created.session_id, topic = %config.topic, "session starting");

        let store = Arc::new(SessionStore::new());
        store.start_session(&created.session_id, config);

        let sequencer = AudioSequencer::spawn(Arc::clone(&store), sink);
        let dispatcher = Dispatcher::new(Arc::clone(&store), sequencer.handle());
        let connection = ConnectionManager::spawn(
            Arc::clone(&store),
            dispatcher,
            &settings.stream,
            &created.session_id,
        );

        Ok(Self {
            store,
            api,
            connection,
            sequencer,
        })
    }

    /// The canonical state store. Subscribe to it for change notifications.
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Id of this session.
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.connection.session_id()
    }

    /// Send one typed teacher turn over the stream.
    pub fn send_teacher_input(&self, text: impl Into<String>) -> Result<()> {
        self.connection.send_teacher_input(text)
    }

    /// Transcribe recorded teacher speech and send the result as a turn.
    ///
    /// When the transcription call fails and the caller captured a partial
    /// transcript locally, the partial is sent instead of failing the turn.
    /// Returns the text that was actually sent.
    pub async fn send_voice_input(
        &self,
        audio: Vec<u8>,
        mime_type: &str,
        partial_transcript: Option<&str>,
    ) -> Result<String> {
        let text = match self.api.transcribe(audio, mime_type).await {
            Ok(text) => text,
            Err(e) => match partial_transcript.filter(|t| !t.trim().is_empty()) {
                Some(partial) => {
                    warn!(error = %e, "transcription failed, falling back to partial transcript");
                    partial.to_string()
                }
                None => return Err(e.into()),
            },
        };
        self.send_teacher_input(&text)?;
        Ok(text)
    }

    /// Inject a disruption and apply its local effects.
    pub async fn inject_chaos(&self, event_id: &str) -> Result<ChaosInjection> {
        let injection = self.api.inject_chaos(self.session_id(), event_id).await?;
        apply_chaos_injection(&self.store, &self.sequencer.handle(), &injection);
        Ok(injection)
    }

    /// End the session: notify the server over the stream, mark the store
    /// ended (which also stops the reconnect loop), and fetch the report.
    pub async fn end_session(&self) -> Result<SessionReport> {
        self.connection.send_session_end();
        self.store.end_session();
        let report = self.api.session_report(self.session_id()).await?;
        info!(session_id = %report.session_id, turns = report.timeline.len(), "session ended");
        Ok(report)
    }

    /// Fetch the end-of-session report without changing local state.
    pub async fn fetch_report(&self) -> Result<SessionReport> {
        Ok(self.api.session_report(self.session_id()).await?)
    }

    /// Tear down the stream and the audio queue.
    pub async fn shutdown(self) {
        self.connection.shutdown().await;
        self.sequencer.shutdown().await;
    }

    /// Tear everything down and restore the store to its seed state.
    ///
    /// Callers holding an `Arc` clone of the store see the reseeded roster.
    pub async fn reset(self) {
        let store = Arc::clone(&self.store);
        self.shutdown().await;
        store.reset();
    }
}

/// Apply a chaos injection's local effects: flag the disruption, log it,
/// and play out each student's scripted reaction.
///
/// Reaction clips go through the same queue as response audio, so a chaos
/// outburst still never overlaps a playing student voice.
pub fn apply_chaos_injection(
    store: &Arc<SessionStore>,
    audio: &AudioHandle,
    injection: &ChaosInjection,
) {
    store.set_chaos(true, Some(injection.event.description.clone()));
    store.append_entry(ConversationEntry::new(
        Speaker::Chaos,
        &injection.event.description,
    ));

    for responder in &injection.responders {
        if let Some(emotional_state) = responder.emotional_state {
            store.apply_student_patch(
                &responder.student_id,
                &StudentPatch {
                    emotional_state: Some(emotional_state),
                    ..StudentPatch::default()
                },
            );
        }

        let Ok(id) = responder.student_id.parse::<StudentId>() else {
            warn!(student_id = %responder.student_id, "chaos responder unknown, skipping");
            continue;
        };

        if let Some(text) = &responder.text {
            let current = store.student(id);
            store.append_entry(ConversationEntry {
                timestamp: chrono::Utc::now(),
                speaker: Speaker::Student(id),
                text: text.clone(),
                emotion: responder
                    .emotional_state
                    .or_else(|| current.as_ref().map(|s| s.emotional_state)),
                engagement: current.as_ref().map(|s| s.engagement),
            });
        }

        if let Some(encoded) = &responder.audio_base64 {
            use base64::Engine as _;
            match base64::engine::general_purpose::STANDARD.decode(encoded) {
                Ok(bytes) => audio.enqueue(id, bytes),
                Err(e) => {
                    warn!(speaker = %id, error = %e, "undecodable chaos audio, skipping clip");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::net::TcpListener;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use teachlab_api::{ChaosEventInfo, ChaosResponder};
    use teachlab_core::roster::EmotionalState;
    use teachlab_core::session::SessionPhase;
    use teachlab_settings::{ApiSettings, StreamSettings};

    use crate::audio::NullSink;

    fn config() -> SessionConfig {
        SessionConfig {
            subject: "Biology".into(),
            topic: "Photosynthesis".into(),
            grade_level: "7th grade".into(),
        }
    }

    fn injection(responders: Vec<ChaosResponder>) -> ChaosInjection {
        ChaosInjection {
            event: ChaosEventInfo {
                id: "fire_drill".into(),
                description: "The fire alarm goes off mid-sentence.".into(),
                label: None,
            },
            responders,
        }
    }

    #[tokio::test]
    async fn chaos_injection_flags_logs_and_patches() {
        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));

        apply_chaos_injection(
            &store,
            &sequencer.handle(),
            &injection(vec![ChaosResponder {
                student_id: "priya".into(),
                student_name: "Priya".into(),
                text: Some("Is this a real one?!".into()),
                emotional_state: Some(EmotionalState::Anxious),
                audio_base64: None,
            }]),
        );

        let chaos = store.chaos();
        assert!(chaos.active);
        assert_eq!(
            chaos.description.as_deref(),
            Some("The fire alarm goes off mid-sentence.")
        );

        let log = store.conversation();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].speaker, Speaker::Chaos);
        assert_eq!(log[1].speaker, Speaker::Student(StudentId::Priya));
        assert_eq!(log[1].emotion, Some(EmotionalState::Anxious));

        assert_eq!(
            store.student(StudentId::Priya).unwrap().emotional_state,
            EmotionalState::Anxious
        );
        sequencer.shutdown().await;
    }

    #[tokio::test]
    async fn chaos_injection_tolerates_unknown_responder() {
        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));

        apply_chaos_injection(
            &store,
            &sequencer.handle(),
            &injection(vec![ChaosResponder {
                student_id: "zoe".into(),
                student_name: "Zoe".into(),
                text: Some("who?".into()),
                emotional_state: None,
                audio_base64: None,
            }]),
        );

        // Chaos entry only; the unknown responder contributes nothing
        assert_eq!(store.conversation().len(), 1);
        sequencer.shutdown().await;
    }

    #[tokio::test]
    async fn chaos_responder_without_text_still_patches_emotion() {
        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));

        apply_chaos_injection(
            &store,
            &sequencer.handle(),
            &injection(vec![ChaosResponder {
                student_id: "jake".into(),
                student_name: "Jake".into(),
                text: None,
                emotional_state: Some(EmotionalState::Distracted),
                audio_base64: None,
            }]),
        );

        assert_eq!(store.conversation().len(), 1);
        assert_eq!(
            store.student(StudentId::Jake).unwrap().emotional_state,
            EmotionalState::Distracted
        );
        sequencer.shutdown().await;
    }

    /// Minimal WebSocket endpoint that accepts connections and discards
    /// inbound frames, so `begin` has something to attach to.
    async fn quiet_ws_endpoint() -> (String, tokio::task::JoinHandle<()>) {
        use futures::StreamExt;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let _ = tokio::spawn(async move {
                    let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    let (_tx, mut rx) = ws.split();
                    while let Some(Ok(_)) = rx.next().await {}
                });
            }
        });
        (format!("ws://{addr}"), handle)
    }

    async fn settings_for(server: &MockServer) -> (TeachLabSettings, tokio::task::JoinHandle<()>) {
        let (ws_url, ws_task) = quiet_ws_endpoint().await;
        let settings = TeachLabSettings {
            api: ApiSettings {
                base_url: server.uri(),
            },
            stream: StreamSettings {
                url: ws_url,
                reconnect_delay_ms: 60_000,
            },
        };
        (settings, ws_task)
    }

    async fn wait_connected(store: &SessionStore) {
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(5);
        while !store.is_connected() {
            assert!(tokio::time::Instant::now() < deadline, "never connected");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn begin_creates_session_and_activates_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-42",
                "students": []
            })))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();

        assert_eq!(session.session_id(), "sess-42");
        assert_eq!(session.store().phase(), SessionPhase::Active);
        wait_connected(session.store()).await;

        session.shutdown().await;
        ws_task.abort();
    }

    #[tokio::test]
    async fn end_session_marks_store_and_returns_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-9"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/sess-9/end"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-9",
                "timeline": [],
                "feedback": "Good pacing."
            })))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();
        wait_connected(session.store()).await;

        let report = session.end_session().await.unwrap();
        assert_eq!(report.feedback.as_deref(), Some("Good pacing."));
        assert_eq!(session.store().phase(), SessionPhase::Ended);

        session.shutdown().await;
        ws_task.abort();
    }

    #[tokio::test]
    async fn reset_restores_seed_state_through_shared_store() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-r"
            })))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();
        let store = Arc::clone(session.store());
        assert_eq!(store.phase(), SessionPhase::Active);

        session.reset().await;
        assert_eq!(store.phase(), SessionPhase::Setup);
        assert!(store.session_id().is_none());
        ws_task.abort();
    }

    #[tokio::test]
    async fn voice_input_falls_back_to_partial_transcript() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-7"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(ResponseTemplate::new(500).set_body_string("stt unavailable"))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();
        wait_connected(session.store()).await;

        let sent = session
            .send_voice_input(vec![1, 2, 3], "audio/webm", Some("who can tell me"))
            .await
            .unwrap();
        assert_eq!(sent, "who can tell me");

        let log = session.store().conversation();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].text, "who can tell me");

        session.shutdown().await;
        ws_task.abort();
    }

    #[tokio::test]
    async fn voice_input_without_fallback_propagates_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-8"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/transcribe"))
            .respond_with(ResponseTemplate::new(500).set_body_string("stt unavailable"))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();
        wait_connected(session.store()).await;

        let err = session
            .send_voice_input(vec![1], "audio/webm", None)
            .await
            .unwrap_err();
        assert!(matches!(err, crate::errors::ClientError::Api(_)));
        assert!(session.store().conversation().is_empty());

        session.shutdown().await;
        ws_task.abort();
    }

    #[tokio::test]
    async fn inject_chaos_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/session"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "session_id": "sess-5"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/session/sess-5/chaos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "event": {"id": "jake_phone", "description": "Jake's phone goes off loudly."},
                "responders": [
                    {"student_id": "jake", "student_name": "Jake", "text": "Sorry! Sorry!", "emotional_state": "anxious"}
                ]
            })))
            .mount(&server)
            .await;
        let (settings, ws_task) = settings_for(&server).await;

        let session = ClassroomSession::begin(&settings, config(), Arc::new(NullSink))
            .await
            .unwrap();
        wait_connected(session.store()).await;

        let injection = session.inject_chaos("jake_phone").await.unwrap();
        assert_eq!(injection.event.id, "jake_phone");
        assert!(session.store().chaos().active);
        assert_eq!(
            session.store().student(StudentId::Jake).unwrap().emotional_state,
            EmotionalState::Anxious
        );

        session.shutdown().await;
        ws_task.abort();
    }
}
