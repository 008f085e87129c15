//! The fixed student roster and per-student state.
//!
//! The classroom always contains the same five students. They are seeded at
//! session start and mutated in place; nothing ever adds or removes a roster
//! member. Wire messages identify students by lowercase string ids, which may
//! name students this client does not know — callers treat a failed parse as
//! a soft error, never a fatal one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifier for a roster member.
///
/// Closed enumeration: the roster is fixed for the life of the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentId {
    Maya,
    Carlos,
    Jake,
    Priya,
    Marcus,
}

impl StudentId {
    /// All roster members, in seating order.
    pub const ALL: [StudentId; 5] = [
        StudentId::Maya,
        StudentId::Carlos,
        StudentId::Jake,
        StudentId::Priya,
        StudentId::Marcus,
    ];

    /// Wire id (lowercase).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Maya => "maya",
            Self::Carlos => "carlos",
            Self::Jake => "jake",
            Self::Priya => "priya",
            Self::Marcus => "marcus",
        }
    }

    /// Display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Maya => "Maya",
            Self::Carlos => "Carlos",
            Self::Jake => "Jake",
            Self::Priya => "Priya",
            Self::Marcus => "Marcus",
        }
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire student id names nobody on the roster.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown student id: {0}")]
pub struct UnknownStudent(pub String);

impl FromStr for StudentId {
    type Err = UnknownStudent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maya" => Ok(Self::Maya),
            "carlos" => Ok(Self::Carlos),
            "jake" => Ok(Self::Jake),
            "priya" => Ok(Self::Priya),
            "marcus" => Ok(Self::Marcus),
            other => Err(UnknownStudent(other.to_string())),
        }
    }
}

/// Emotional state of a student, as reported by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Eager,
    Confused,
    Distracted,
    Anxious,
    Bored,
    Engaged,
    Frustrated,
}

impl EmotionalState {
    /// Wire label (lowercase).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eager => "eager",
            Self::Confused => "confused",
            Self::Distracted => "distracted",
            Self::Anxious => "anxious",
            Self::Bored => "bored",
            Self::Engaged => "engaged",
            Self::Frustrated => "frustrated",
        }
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable per-student record owned by the session store.
///
/// `engagement` and `comprehension` are always on the canonical 0–100 integer
/// scale (see [`crate::metrics::normalize_metric`]).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentState {
    /// Roster identifier.
    pub id: StudentId,
    /// Display name.
    pub name: String,
    /// Persona description shown in the UI and the session report.
    pub persona: String,
    /// Engagement, 0–100.
    pub engagement: u8,
    /// Comprehension, 0–100.
    pub comprehension: u8,
    /// Current emotional state.
    pub emotional_state: EmotionalState,
    /// Voice used when requesting synthesized audio from the server.
    pub voice_id: String,
}

/// Partial update applied to one student. Unset fields retain prior values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudentPatch {
    /// New engagement, already normalized to 0–100.
    pub engagement: Option<u8>,
    /// New comprehension, already normalized to 0–100.
    pub comprehension: Option<u8>,
    /// New emotional state.
    pub emotional_state: Option<EmotionalState>,
}

/// Initial roster state, applied at session creation and on reset.
#[must_use]
pub fn seed_roster() -> Vec<StudentState> {
    vec![
        StudentState {
            id: StudentId::Maya,
            name: "Maya".into(),
            persona: "Eager overachiever — always answers first, asks advanced questions. \
                      Gets bored if the pace is too slow."
                .into(),
            engagement: 85,
            comprehension: 90,
            emotional_state: EmotionalState::Engaged,
            voice_id: "en-US-JennyNeural".into(),
        },
        StudentState {
            id: StudentId::Carlos,
            name: "Carlos".into(),
            persona: "ESL student — asks for clarification, prefers simpler language. \
                      Shuts down if vocabulary is too complex."
                .into(),
            engagement: 60,
            comprehension: 55,
            emotional_state: EmotionalState::Confused,
            voice_id: "es-MX-JorgeNeural".into(),
        },
        StudentState {
            id: StudentId::Jake,
            name: "Jake".into(),
            persona: "Distracted — goes off-topic, needs frequent re-engagement. \
                      Responds to enthusiasm and direct callouts."
                .into(),
            engagement: 40,
            comprehension: 50,
            emotional_state: EmotionalState::Bored,
            voice_id: "en-US-BrandonNeural".into(),
        },
        StudentState {
            id: StudentId::Priya,
            name: "Priya".into(),
            persona: "Anxious and quiet — rarely speaks unless directly called on. \
                      Blooms with encouragement, shuts down under pressure."
                .into(),
            engagement: 50,
            comprehension: 75,
            emotional_state: EmotionalState::Anxious,
            voice_id: "en-IN-NeerjaNeural".into(),
        },
        StudentState {
            id: StudentId::Marcus,
            name: "Marcus".into(),
            persona: "Skeptical critical thinker — challenges assumptions, tends to debate. \
                      Engages when given agency to question things."
                .into(),
            engagement: 65,
            comprehension: 80,
            emotional_state: EmotionalState::Engaged,
            voice_id: "en-US-DavisNeural".into(),
        },
    ]
}
