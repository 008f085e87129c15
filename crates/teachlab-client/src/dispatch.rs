//! Frame dispatcher.
//!
//! Routes each inbound [`ServerFrame`] to its effects on the store and the
//! audio queue. The dispatcher itself is stateless: everything it needs to
//! remember between frames (the responded-this-turn flag included) lives in
//! the store, so a reconnect mid-turn cannot lose track of it.
//!
//! Frames that fail to parse are logged and discarded. The stream must keep
//! flowing no matter what the server sends.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, warn};

use teachlab_core::metrics::normalize_metric;
use teachlab_core::protocol::ServerFrame;
use teachlab_core::roster::{StudentId, StudentPatch};
use teachlab_core::session::{ConversationEntry, Speaker};

use crate::audio::AudioHandle;
use crate::store::SessionStore;

/// Entry text used when a turn completes without any student speaking.
pub const NO_RESPONSE_TEXT: &str = "No one responded.";

/// Routes inbound frames to store mutations and audio enqueues.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<SessionStore>,
    audio: AudioHandle,
}

impl Dispatcher {
    /// Build a dispatcher over the given store and audio queue.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, audio: AudioHandle) -> Self {
        Self { store, audio }
    }

    /// Parse and dispatch one raw text frame. Malformed input is discarded
    /// with a diagnostic.
    pub fn dispatch_raw(&self, raw: &str) {
        match ServerFrame::parse(raw) {
            Ok(frame) => self.dispatch(frame),
            Err(e) => {
                warn!(error = %e, frame = raw, "discarding malformed frame");
            }
        }
    }

    /// Apply one parsed frame's effects.
    pub fn dispatch(&self, frame: ServerFrame) {
        debug!(kind = frame.kind(), "dispatching frame");
        match frame {
            ServerFrame::StudentResponse {
                student_id,
                student_name,
                text,
                emotional_state,
                engagement,
                comprehension,
                audio_base64,
            } => {
                // A response arrived, so this turn will not need the
                // synthetic no-response entry. Clearing the processing flag
                // here makes the first responder unblock the input, even
                // before the closing state_update.
                self.store.set_responded_this_turn(true);
                self.store.set_processing(false);

                let engagement = normalize_metric(engagement);
                self.store.apply_student_patch(
                    &student_id,
                    &StudentPatch {
                        engagement: Some(engagement),
                        comprehension: Some(normalize_metric(comprehension)),
                        emotional_state: Some(emotional_state),
                    },
                );

                let Ok(id) = student_id.parse::<StudentId>() else {
                    warn!(%student_id, %student_name, "response from unknown student, dropping entry");
                    return;
                };
                self.store.append_entry(ConversationEntry::student(
                    id,
                    text,
                    emotional_state,
                    engagement,
                ));

                if let Some(encoded) = audio_base64 {
                    match BASE64.decode(&encoded) {
                        Ok(bytes) => self.audio.enqueue(id, bytes),
                        Err(e) => {
                            warn!(speaker = %id, error = %e, "undecodable audio payload, skipping clip");
                        }
                    }
                }
            }

            ServerFrame::StateUpdate {
                students,
                coaching_hint,
            } => {
                self.store.apply_bulk_update(&students);
                if coaching_hint.is_some() {
                    self.store.set_coaching_hint(coaching_hint);
                }
                if !self.store.responded_this_turn() {
                    self.store
                        .append_entry(ConversationEntry::new(Speaker::Nobody, NO_RESPONSE_TEXT));
                }
                self.store.set_responded_this_turn(false);
                self.store.set_processing(false);
            }

            ServerFrame::SessionEnd { session_id } => {
                debug!(%session_id, "server ended session");
                self.store.end_session();
            }

            ServerFrame::Error { message } => {
                warn!(%message, "server error frame");
                self.store.set_error(Some(message));
                self.store.set_processing(false);
            }

            ServerFrame::ChaosResolved { coaching_hint } => {
                self.store.set_chaos(false, None);
                if coaching_hint.is_some() {
                    self.store.set_coaching_hint(coaching_hint);
                }
            }
        }
    }
}
