//! Wire protocol for the session WebSocket.
//!
//! Both directions are JSON objects discriminated by a `type` field. The
//! server-to-client side is a closed union of five kinds; adding a kind means
//! adding a variant here, and the compiler then forces every dispatch site to
//! handle it. Frames that fail to parse are discarded by the dispatcher with
//! a diagnostic — an unknown `type` must never crash the client.
//!
//! Metrics on the stream arrive as 0–1 fractions; normalization to the 0–100
//! scale happens at the store boundary, not here.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::roster::EmotionalState;

/// Per-student metric fields carried by a [`ServerFrame::StateUpdate`].
///
/// All fields optional: unset fields leave the student's prior value intact.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentMetricsWire {
    /// Engagement as a 0–1 fraction (or, defensively, 0–100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engagement: Option<f64>,
    /// Comprehension as a 0–1 fraction (or, defensively, 0–100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comprehension: Option<f64>,
    /// New emotional state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<EmotionalState>,
}

/// Inbound frame from the session server.
///
/// Student ids stay raw strings at this layer: a frame naming a student this
/// roster does not know is still a valid frame, and the store treats the
/// unknown id as a soft error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// One student spoke this turn.
    #[serde(rename = "student_response")]
    StudentResponse {
        /// Wire id of the speaker.
        student_id: String,
        /// Display name of the speaker.
        student_name: String,
        /// What the student said.
        text: String,
        /// Emotional state after responding.
        emotional_state: EmotionalState,
        /// Engagement, 0–1 fraction.
        engagement: f64,
        /// Comprehension, 0–1 fraction.
        comprehension: f64,
        /// Base64-encoded synthesized speech, when available.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        audio_base64: Option<String>,
    },

    /// Aggregate end-of-turn state for the roster.
    #[serde(rename = "state_update")]
    StateUpdate {
        /// Patches keyed by wire student id.
        students: BTreeMap<String, StudentMetricsWire>,
        /// Advisory string for the teacher, when the server has one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coaching_hint: Option<String>,
    },

    /// The server has ended the session.
    #[serde(rename = "session_end")]
    SessionEnd {
        /// Session being ended.
        session_id: String,
    },

    /// Server-reported application error.
    #[serde(rename = "error")]
    Error {
        /// Human-readable message, surfaced verbatim.
        message: String,
    },

    /// A previously injected disruption has been resolved.
    #[serde(rename = "chaos_resolved")]
    ChaosResolved {
        /// Advisory string accompanying the resolution, when present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coaching_hint: Option<String>,
    },
}

impl ServerFrame {
    /// Parse a raw text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The `type` discriminator string.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StudentResponse { .. } => "student_response",
            Self::StateUpdate { .. } => "state_update",
            Self::SessionEnd { .. } => "session_end",
            Self::Error { .. } => "error",
            Self::ChaosResolved { .. } => "chaos_resolved",
        }
    }
}

/// Outbound frame to the session server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Teacher spoke or typed.
    #[serde(rename = "teacher_input")]
    TeacherInput {
        /// Session the input belongs to.
        session_id: String,
        /// Teacher's text (typed, or transcribed from voice).
        text: String,
    },

    /// Teacher ended the session.
    #[serde(rename = "session_end")]
    SessionEnd {
        /// Session being ended.
        session_id: String,
    },
}

impl ClientFrame {
    /// Serialize to the wire representation.
    ///
    /// Infallible in practice: these frames contain only strings.
    #[must_use]
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
