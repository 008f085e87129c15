//! # teachlab-client
//!
//! Realtime synchronization core for a live classroom session. Four
//! cooperating components, all sharing one [`store::SessionStore`]:
//!
//! - **Store** ([`store`]) — canonical session state, broadcast change
//!   notifications, atomic end-of-turn bulk updates.
//! - **Audio sequencer** ([`audio`]) — strict FIFO playback of synthesized
//!   student voices; never two clips at once.
//! - **Dispatcher** ([`dispatch`]) — routes each inbound frame to its store
//!   and audio effects; stateless between frames.
//! - **Connection manager** ([`connection`]) — the session WebSocket, with
//!   fixed-delay reconnection for as long as the session is active.
//!
//! [`session::ClassroomSession`] is the facade that wires them together.
//!
//! ## Crate Position
//!
//! Depends on teachlab-core, teachlab-settings, and teachlab-api. Depended on
//! by the CLI.

#![deny(unsafe_code)]

pub mod audio;
pub mod connection;
pub mod dispatch;
pub mod errors;
pub mod session;
pub mod store;

pub use audio::{AudioHandle, AudioSequencer, AudioSink, NullSink, PlaybackError};
pub use connection::ConnectionManager;
pub use dispatch::Dispatcher;
pub use errors::{ClientError, Result};
pub use session::ClassroomSession;
pub use store::{ClassAverages, SessionStore, StoreEvent, TurnSummary};
