//! Session lifecycle, conversation log, and per-turn history types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::roster::{EmotionalState, StudentId};

/// Lifecycle phase of a session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// No session running; roster is at seed values.
    #[default]
    Setup,
    /// Live session with an open (or reconnecting) stream.
    Active,
    /// Session finished; the conversation log remains as a stable artifact.
    Ended,
}

/// Parameters supplied when creating a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Subject area, e.g. "Biology".
    pub subject: String,
    /// Lesson topic, e.g. "Photosynthesis".
    pub topic: String,
    /// Grade level, e.g. "7th grade".
    pub grade_level: String,
}

/// Who a conversation entry is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The human teacher.
    Teacher,
    /// A roster member.
    Student(StudentId),
    /// Synthetic marker for an injected chaos event.
    Chaos,
    /// Synthetic marker for a turn where no student responded.
    Nobody,
}

impl Speaker {
    /// Human-readable label used in transcripts.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Teacher => "Teacher",
            Self::Student(id) => id.display_name(),
            Self::Chaos => "[CHAOS]",
            Self::Nobody => "—",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One entry in the append-only conversation log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    /// When the entry was recorded (client clock).
    pub timestamp: DateTime<Utc>,
    /// Attribution.
    pub speaker: Speaker,
    /// Spoken or typed text.
    pub text: String,
    /// Emotion at the time of speaking, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<EmotionalState>,
    /// Engagement (0–100) at the time of speaking, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement: Option<u8>,
}

impl ConversationEntry {
    /// Entry with no emotion/engagement annotation, timestamped now.
    #[must_use]
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            speaker,
            text: text.into(),
            emotion: None,
            engagement: None,
        }
    }

    /// Teacher entry timestamped now.
    #[must_use]
    pub fn teacher(text: impl Into<String>) -> Self {
        Self::new(Speaker::Teacher, text)
    }

    /// Student entry with emotion and engagement annotations.
    #[must_use]
    pub fn student(
        id: StudentId,
        text: impl Into<String>,
        emotion: EmotionalState,
        engagement: u8,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            speaker: Speaker::Student(id),
            text: text.into(),
            emotion: Some(emotion),
            engagement: Some(engagement),
        }
    }
}

/// Engagement of the full roster at one completed turn.
///
/// Appended exactly once per accepted bulk state update; students the update
/// did not touch appear at their last known value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementSnapshot {
    /// Turn index, 1-based and strictly increasing.
    pub turn: u32,
    /// Engagement (0–100) per roster member.
    pub levels: BTreeMap<StudentId, u8>,
}

/// Classroom disruption state.
///
/// Active chaos and a calm classroom are mutually exclusive; transitions
/// happen only via chaos injection and the server's `chaos_resolved` frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosState {
    /// Whether a disruption is currently in progress.
    pub active: bool,
    /// Description of the disruption, when active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
