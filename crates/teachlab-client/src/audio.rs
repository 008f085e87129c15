//! Sequential audio playback.
//!
//! Synthesized student voices must never overlap, and arrival order decides
//! playback order regardless of network jitter. Clips go into an unbounded
//! FIFO channel drained by a single task: set the speaking marker, play,
//! clear the marker, next. A playback failure is treated exactly like
//! completion — the queue always advances.
//!
//! Decoding and output are environment concerns, abstracted behind
//! [`AudioSink`]; the payload stays an opaque byte blob here.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use teachlab_core::roster::StudentId;

use crate::store::SessionStore;

/// Playback failure reported by a sink.
#[derive(Debug, thiserror::Error)]
#[error("playback failed: {0}")]
pub struct PlaybackError(pub String);

/// Environment-provided audio output.
///
/// `play` resolves when the clip has finished (or failed to) play.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play one clip to completion.
    async fn play(&self, speaker: StudentId, audio: &[u8]) -> Result<(), PlaybackError>;
}

/// Sink that discards audio immediately. Headless runs and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AudioSink for NullSink {
    async fn play(&self, _speaker: StudentId, _audio: &[u8]) -> Result<(), PlaybackError> {
        Ok(())
    }
}

/// One queued clip.
#[derive(Clone, Debug)]
pub struct AudioClip {
    /// Whose voice this is.
    pub speaker: StudentId,
    /// Decoded (from base64) but otherwise opaque audio bytes.
    pub audio: Vec<u8>,
}

/// Cheap handle for enqueueing clips from the dispatcher and the facade.
#[derive(Clone, Debug)]
pub struct AudioHandle {
    tx: mpsc::UnboundedSender<AudioClip>,
}

impl AudioHandle {
    /// Append a clip to the tail of the queue.
    ///
    /// If nothing is playing, playback starts immediately. After sequencer
    /// shutdown this becomes a logged no-op.
    pub fn enqueue(&self, speaker: StudentId, audio: Vec<u8>) {
        if self.tx.send(AudioClip { speaker, audio }).is_err() {
            debug!(%speaker, "audio sequencer stopped, dropping clip");
        }
    }
}

/// Owns the playback task. One per session.
pub struct AudioSequencer {
    store: Arc<SessionStore>,
    handle: AudioHandle,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AudioSequencer {
    /// Spawn the playback task.
    #[must_use]
    pub fn spawn(store: Arc<SessionStore>, sink: Arc<dyn AudioSink>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_queue(
            Arc::clone(&store),
            sink,
            rx,
            cancel.clone(),
        ));
        Self {
            store,
            handle: AudioHandle { tx },
            cancel,
            task,
        }
    }

    /// Handle for enqueueing clips.
    #[must_use]
    pub fn handle(&self) -> AudioHandle {
        self.handle.clone()
    }

    /// Who is speaking now, or `None`.
    #[must_use]
    pub fn current_speaker(&self) -> Option<StudentId> {
        self.store.current_speaker()
    }

    /// Stop playback, drop any queued clips, and clear the speaking marker.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.handle);
        if self.task.await.is_err() {
            warn!("audio playback task panicked during shutdown");
        }
        self.store.set_speaking(None);
    }
}

/// Drain the queue one clip at a time until cancelled or all senders drop.
async fn run_queue(
    store: Arc<SessionStore>,
    sink: Arc<dyn AudioSink>,
    mut rx: mpsc::UnboundedReceiver<AudioClip>,
    cancel: CancellationToken,
) {
    loop {
        let clip = tokio::select! {
            () = cancel.cancelled() => break,
            clip = rx.recv() => match clip {
                Some(clip) => clip,
                None => break,
            },
        };

        store.set_speaking(Some(clip.speaker));
        tokio::select! {
            () = cancel.cancelled() => {
                store.set_speaking(None);
                break;
            }
            result = sink.play(clip.speaker, &clip.audio) => {
                if let Err(e) = result {
                    // Failure advances the queue just like completion
                    warn!(speaker = %clip.speaker, error = %e, "audio playback failed, skipping clip");
                }
            }
        }
        store.set_speaking(None);
    }
    debug!("audio sequencer stopped");
}
