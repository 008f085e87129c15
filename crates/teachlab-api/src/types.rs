//! Response types for the session server's REST surface.

use serde::{Deserialize, Serialize};

use teachlab_core::roster::EmotionalState;

/// Ids of the disruption scenarios the server knows how to inject.
///
/// Kept client-side so pickers can offer them without a catalog endpoint.
pub const CHAOS_EVENT_IDS: &[&str] = &[
    "jake_drawing",
    "marcus_interrupts",
    "carlos_raises_hand",
    "priya_crying",
    "maya_wrong",
    "jake_phone",
    "marcus_walks_out",
    "fire_drill",
];

/// `GET /health` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Server status string.
    pub status: String,
    /// Number of live sessions on the server.
    #[serde(default)]
    pub sessions_active: u32,
}

/// Roster member info returned by session creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterMemberInfo {
    /// Wire student id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Persona label.
    pub persona: String,
    /// Voice used for synthesized audio.
    pub voice_id: String,
}

/// `POST /session` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// Id of the created session; also the WebSocket path segment.
    pub session_id: String,
    /// The server's roster, for cross-checking against the local seed.
    #[serde(default)]
    pub students: Vec<RosterMemberInfo>,
}

/// One annotated turn in the end-of-session report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Turn index.
    pub turn: u32,
    /// Speaker label as recorded by the server.
    pub speaker: String,
    /// Text of the turn.
    pub text: String,
}

/// `POST /session/{id}/end` response: the end-of-session report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionReport {
    /// Session the report describes.
    pub session_id: String,
    /// Turn-by-turn annotations.
    #[serde(default)]
    pub timeline: Vec<TimelineEntry>,
    /// Coaching feedback summary, when the server produced one.
    #[serde(default)]
    pub feedback: Option<String>,
}

/// `POST /transcribe` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    /// Transcribed text.
    pub text: String,
}

/// The injected disruption, as described by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosEventInfo {
    /// Scenario id (see [`CHAOS_EVENT_IDS`]).
    pub id: String,
    /// Description shown to the teacher and logged to the conversation.
    pub description: String,
    /// Short UI label.
    #[serde(default)]
    pub label: Option<String>,
}

/// One student's reaction to an injected disruption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosResponder {
    /// Wire student id.
    pub student_id: String,
    /// Display name.
    pub student_name: String,
    /// What the student said, if anything.
    #[serde(default)]
    pub text: Option<String>,
    /// Emotional state after the disruption.
    #[serde(default)]
    pub emotional_state: Option<EmotionalState>,
    /// Base64-encoded synthesized reaction audio.
    #[serde(default)]
    pub audio_base64: Option<String>,
}

/// `POST /session/{id}/chaos` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosInjection {
    /// The disruption that was injected.
    pub event: ChaosEventInfo,
    /// Per-student reactions, possibly empty.
    #[serde(default)]
    pub responders: Vec<ChaosResponder>,
}
