//! Canonical in-memory session state.
//!
//! The store is the single mutable source of truth. The connection manager,
//! dispatcher, and audio sequencer all hold an `Arc<SessionStore>` and go
//! through its methods; nothing mutates the inner state directly. Every
//! mutation happens under one `parking_lot` write lock, so a bulk update is
//! atomic with respect to readers — no intermediate state is observable.
//!
//! Observers subscribe to a `tokio::sync::broadcast` channel carrying coarse
//! change markers; a bulk update publishes exactly one [`StoreEvent::Turn`].

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use teachlab_core::metrics::normalize_metric;
use teachlab_core::protocol::StudentMetricsWire;
use teachlab_core::roster::{seed_roster, StudentId, StudentPatch, StudentState};
use teachlab_core::session::{
    ChaosState, ConversationEntry, EngagementSnapshot, SessionConfig, SessionPhase,
};

/// Coarse change notification published after a mutation completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// Session id, config, or lifecycle phase changed.
    Session,
    /// One or more student records changed outside a turn boundary.
    Students,
    /// A conversation entry was appended.
    Conversation,
    /// A bulk update completed: patches applied, turn counted, snapshot taken.
    Turn,
    /// Connected / processing / error flags changed.
    Connection,
    /// Chaos state changed.
    Chaos,
    /// Coaching hint changed.
    Hint,
    /// The currently speaking student changed.
    Speaker,
}

/// Average metrics across the roster (0–100 each).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassAverages {
    /// Mean engagement.
    pub engagement: u8,
    /// Mean comprehension.
    pub comprehension: u8,
}

/// Counts of who spoke, for the report header.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TurnSummary {
    /// Entries attributed to the teacher.
    pub teacher_turns: usize,
    /// Entries attributed to students.
    pub student_responses: usize,
}

#[derive(Debug)]
struct StoreInner {
    phase: SessionPhase,
    session_id: Option<String>,
    config: Option<SessionConfig>,
    students: BTreeMap<StudentId, StudentState>,
    conversation: Vec<ConversationEntry>,
    engagement_history: Vec<EngagementSnapshot>,
    turn_count: u32,
    connected: bool,
    processing: bool,
    error: Option<String>,
    responded_this_turn: bool,
    coaching_hint: Option<String>,
    chaos: ChaosState,
    speaking: Option<StudentId>,
}

impl StoreInner {
    fn seeded() -> Self {
        Self {
            phase: SessionPhase::Setup,
            session_id: None,
            config: None,
            students: seed_roster().into_iter().map(|s| (s.id, s)).collect(),
            conversation: Vec::new(),
            engagement_history: Vec::new(),
            turn_count: 0,
            connected: false,
            processing: false,
            error: None,
            responded_this_turn: false,
            coaching_hint: None,
            chaos: ChaosState::default(),
            speaking: None,
        }
    }

    fn apply_patch(&mut self, id: StudentId, patch: &StudentPatch) {
        let Some(student) = self.students.get_mut(&id) else {
            return;
        };
        if let Some(engagement) = patch.engagement {
            student.engagement = engagement;
        }
        if let Some(comprehension) = patch.comprehension {
            student.comprehension = comprehension;
        }
        if let Some(emotional_state) = patch.emotional_state {
            student.emotional_state = emotional_state;
        }
    }
}

/// The canonical session state store.
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    events: broadcast::Sender<StoreEvent>,
}

impl SessionStore {
    /// Create a store with the seeded roster and phase `Setup`.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: RwLock::new(StoreInner::seeded()),
            events,
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: StoreEvent) {
        // No receivers is fine (headless use, tests)
        let _ = self.events.send(event);
    }

    // ── Session lifecycle ───────────────────────────────────────────────────

    /// Begin a live session: record id/config, move to `Active`, and clear
    /// any log/history left over from a previous run.
    pub fn start_session(&self, session_id: impl Into<String>, config: SessionConfig) {
        {
            let mut inner = self.inner.write();
            inner.session_id = Some(session_id.into());
            inner.config = Some(config);
            inner.phase = SessionPhase::Active;
            inner.conversation.clear();
            inner.engagement_history.clear();
            inner.turn_count = 0;
            inner.responded_this_turn = false;
            inner.coaching_hint = None;
            inner.chaos = ChaosState::default();
        }
        self.emit(StoreEvent::Session);
    }

    /// Move to `Ended`. The conversation log is kept as a stable artifact.
    pub fn end_session(&self) {
        {
            let mut inner = self.inner.write();
            inner.phase = SessionPhase::Ended;
            inner.processing = false;
        }
        self.emit(StoreEvent::Session);
    }

    /// Restore the initial roster and `Setup` phase; clear all logs, history,
    /// counters, and flags.
    pub fn reset(&self) {
        *self.inner.write() = StoreInner::seeded();
        self.emit(StoreEvent::Session);
    }

    // ── Student mutation ────────────────────────────────────────────────────

    /// Merge the supplied fields into the named student's record.
    ///
    /// An id naming nobody on the roster is a soft error: logged, no-op.
    pub fn apply_student_patch(&self, student_id: &str, patch: &StudentPatch) {
        let Ok(id) = student_id.parse::<StudentId>() else {
            warn!(student_id, "patch for unknown student, ignoring");
            return;
        };
        self.inner.write().apply_patch(id, patch);
        self.emit(StoreEvent::Students);
    }

    /// Apply one end-of-turn bulk update atomically.
    ///
    /// Under a single write lock: every named (known) student is patched with
    /// normalized metrics, the turn counter advances by exactly one, and one
    /// engagement snapshot of the *full* roster is appended — unmodified
    /// students appear at their last known value. Unknown ids are logged and
    /// skipped without aborting the update.
    pub fn apply_bulk_update(&self, patches: &BTreeMap<String, StudentMetricsWire>) {
        {
            let mut inner = self.inner.write();
            for (wire_id, metrics) in patches {
                let Ok(id) = wire_id.parse::<StudentId>() else {
                    warn!(student_id = %wire_id, "bulk update names unknown student, skipping");
                    continue;
                };
                let patch = StudentPatch {
                    engagement: metrics.engagement.map(normalize_metric),
                    comprehension: metrics.comprehension.map(normalize_metric),
                    emotional_state: metrics.emotional_state,
                };
                inner.apply_patch(id, &patch);
            }
            inner.turn_count += 1;
            let snapshot = EngagementSnapshot {
                turn: inner.turn_count,
                levels: inner
                    .students
                    .iter()
                    .map(|(&id, s)| (id, s.engagement))
                    .collect(),
            };
            inner.engagement_history.push(snapshot);
            debug!(turn = inner.turn_count, patched = patches.len(), "bulk update applied");
        }
        self.emit(StoreEvent::Turn);
    }

    // ── Conversation log ────────────────────────────────────────────────────

    /// Append to the ordered, append-only conversation log.
    pub fn append_entry(&self, entry: ConversationEntry) {
        self.inner.write().conversation.push(entry);
        self.emit(StoreEvent::Conversation);
    }

    // ── Connection / turn flags ─────────────────────────────────────────────

    /// Set the connected flag.
    pub fn set_connected(&self, connected: bool) {
        self.inner.write().connected = connected;
        self.emit(StoreEvent::Connection);
    }

    /// Set the "processing a teacher turn" flag.
    pub fn set_processing(&self, processing: bool) {
        self.inner.write().processing = processing;
        self.emit(StoreEvent::Connection);
    }

    /// Set or clear the user-visible error message.
    pub fn set_error(&self, error: Option<String>) {
        self.inner.write().error = error;
        self.emit(StoreEvent::Connection);
    }

    /// Mark whether any student has responded in the current turn.
    pub fn set_responded_this_turn(&self, responded: bool) {
        self.inner.write().responded_this_turn = responded;
    }

    /// Whether any student has responded in the current turn.
    #[must_use]
    pub fn responded_this_turn(&self) -> bool {
        self.inner.read().responded_this_turn
    }

    // ── Chaos / hint / speaker ──────────────────────────────────────────────

    /// Set or clear the chaos state.
    pub fn set_chaos(&self, active: bool, description: Option<String>) {
        {
            let mut inner = self.inner.write();
            inner.chaos = ChaosState {
                active,
                description,
            };
        }
        self.emit(StoreEvent::Chaos);
    }

    /// Publish or clear the coaching hint.
    pub fn set_coaching_hint(&self, hint: Option<String>) {
        self.inner.write().coaching_hint = hint;
        self.emit(StoreEvent::Hint);
    }

    /// Set who is currently speaking (audio sequencer only).
    pub fn set_speaking(&self, speaking: Option<StudentId>) {
        self.inner.write().speaking = speaking;
        self.emit(StoreEvent::Speaker);
    }

    // ── Read accessors ──────────────────────────────────────────────────────

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.inner.read().phase
    }

    /// Current session id, when a session has been started.
    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    /// Session config, when a session has been started.
    #[must_use]
    pub fn config(&self) -> Option<SessionConfig> {
        self.inner.read().config.clone()
    }

    /// Snapshot of one student.
    #[must_use]
    pub fn student(&self, id: StudentId) -> Option<StudentState> {
        self.inner.read().students.get(&id).cloned()
    }

    /// Snapshot of the full roster, in seating order.
    #[must_use]
    pub fn students(&self) -> Vec<StudentState> {
        self.inner.read().students.values().cloned().collect()
    }

    /// Snapshot of the conversation log.
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.inner.read().conversation.clone()
    }

    /// Snapshot of the per-turn engagement history.
    #[must_use]
    pub fn engagement_history(&self) -> Vec<EngagementSnapshot> {
        self.inner.read().engagement_history.clone()
    }

    /// Completed turn count.
    #[must_use]
    pub fn turn_count(&self) -> u32 {
        self.inner.read().turn_count
    }

    /// Whether the transport is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.read().connected
    }

    /// Whether a teacher turn is in flight.
    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.inner.read().processing
    }

    /// Current user-visible error, if any.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.read().error.clone()
    }

    /// Current coaching hint, if any.
    #[must_use]
    pub fn coaching_hint(&self) -> Option<String> {
        self.inner.read().coaching_hint.clone()
    }

    /// Current chaos state.
    #[must_use]
    pub fn chaos(&self) -> ChaosState {
        self.inner.read().chaos.clone()
    }

    /// Who is speaking now, or `None`.
    #[must_use]
    pub fn current_speaker(&self) -> Option<StudentId> {
        self.inner.read().speaking
    }

    /// Mean engagement and comprehension across the roster.
    #[must_use]
    pub fn class_averages(&self) -> ClassAverages {
        let inner = self.inner.read();
        let n = inner.students.len().max(1) as u32;
        let (eng, comp) = inner.students.values().fold((0u32, 0u32), |(e, c), s| {
            (e + u32::from(s.engagement), c + u32::from(s.comprehension))
        });
        ClassAverages {
            engagement: ((eng + n / 2) / n) as u8,
            comprehension: ((comp + n / 2) / n) as u8,
        }
    }

    /// Teacher-turn vs student-response counts over the conversation log.
    #[must_use]
    pub fn turn_summary(&self) -> TurnSummary {
        use teachlab_core::session::Speaker;
        let inner = self.inner.read();
        let mut summary = TurnSummary::default();
        for entry in &inner.conversation {
            match entry.speaker {
                Speaker::Teacher => summary.teacher_turns += 1,
                Speaker::Student(_) => summary.student_responses += 1,
                Speaker::Chaos | Speaker::Nobody => {}
            }
        }
        summary
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
