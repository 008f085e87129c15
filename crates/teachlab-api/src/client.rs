//! Typed client for the session server's REST surface.

use tracing::{debug, instrument};

use teachlab_core::session::SessionConfig;
use teachlab_settings::ApiSettings;

use crate::errors::{ApiError, Result};
use crate::types::{
    ChaosInjection, CreateSessionResponse, HealthResponse, SessionReport, TranscriptResponse,
};

/// HTTP client for everything outside the persistent channel: session
/// creation, end-of-session report, speech-to-text, chaos injection.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client against the given base URL (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client from settings.
    #[must_use]
    pub fn from_settings(settings: &ApiSettings) -> Self {
        Self::new(settings.base_url.clone())
    }

    /// Base URL this client talks to.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /health`.
    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Self::expect_success(resp).await?.json().await.map_err(Into::into)
    }

    /// `POST /session` — create a session, returning its id and roster.
    #[instrument(skip(self), fields(topic = %config.topic))]
    pub async fn create_session(&self, config: &SessionConfig) -> Result<CreateSessionResponse> {
        let resp = self
            .http
            .post(format!("{}/session", self.base_url))
            .json(config)
            .send()
            .await?;
        let created: CreateSessionResponse = Self::expect_success(resp).await?.json().await?;
        debug!(session_id = %created.session_id, "session created");
        Ok(created)
    }

    /// `POST /session/{id}/end` — end the session server-side and fetch the
    /// end-of-session report.
    #[instrument(skip(self))]
    pub async fn session_report(&self, session_id: &str) -> Result<SessionReport> {
        let resp = self
            .http
            .post(format!("{}/session/{session_id}/end", self.base_url))
            .send()
            .await?;
        Self::expect_success(resp).await?.json().await.map_err(Into::into)
    }

    /// `POST /transcribe` — speech-to-text for a recorded teacher utterance.
    ///
    /// May fail; the caller is expected to fall back to a locally captured
    /// partial transcript or manual entry.
    #[instrument(skip(self, audio), fields(bytes = audio.len(), mime = mime_type))]
    pub async fn transcribe(&self, audio: Vec<u8>, mime_type: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/transcribe", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .body(audio)
            .send()
            .await?;
        let transcript: TranscriptResponse = Self::expect_success(resp).await?.json().await?;
        Ok(transcript.text)
    }

    /// `POST /session/{id}/chaos?event_id=..` — inject a disruption.
    #[instrument(skip(self))]
    pub async fn inject_chaos(&self, session_id: &str, event_id: &str) -> Result<ChaosInjection> {
        let resp = self
            .http
            .post(format!("{}/session/{session_id}/chaos", self.base_url))
            .query(&[("event_id", event_id)])
            .send()
            .await?;
        Self::expect_success(resp).await?.json().await.map_err(Into::into)
    }

    /// Map non-2xx responses to [`ApiError::Status`] with the body attached.
    async fn expect_success(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let message = resp.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}
