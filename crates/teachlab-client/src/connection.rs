//! Session WebSocket connection manager.
//!
//! Owns one background task per session. The task connects to
//! `{stream_url}/{session_id}`, pumps inbound text frames into the
//! [`Dispatcher`], and drains an outbound channel of [`ClientFrame`]s. When
//! the socket drops it waits a fixed delay and reconnects, forever, until the
//! session ends or the manager is shut down.
//!
//! Outbound sends are guarded by the store's connected flag: a send while
//! disconnected is rejected up front rather than queued into the void.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use teachlab_core::protocol::ClientFrame;
use teachlab_core::session::{ConversationEntry, SessionPhase};
use teachlab_settings::StreamSettings;

use crate::dispatch::Dispatcher;
use crate::errors::{ClientError, Result};
use crate::store::SessionStore;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to the per-session connection task.
pub struct ConnectionManager {
    store: Arc<SessionStore>,
    session_id: String,
    outbound_tx: mpsc::UnboundedSender<ClientFrame>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Spawn the connection task for one session.
    #[must_use]
    pub fn spawn(
        store: Arc<SessionStore>,
        dispatcher: Dispatcher,
        settings: &StreamSettings,
        session_id: impl Into<String>,
    ) -> Self {
        let session_id = session_id.into();
        let url = format!(
            "{}/{}",
            settings.url.trim_end_matches('/'),
            session_id
        );
        let delay = Duration::from_millis(settings.reconnect_delay_ms);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_connection(
            url,
            delay,
            Arc::clone(&store),
            dispatcher,
            outbound_rx,
            cancel.clone(),
        ));
        Self {
            store,
            session_id,
            outbound_tx,
            cancel,
            task,
        }
    }

    /// Send one teacher turn.
    ///
    /// While disconnected this fails fast: the store gets a user-visible
    /// error, no conversation entry is written, and the caller can retry
    /// after the reconnect lands. On success the turn flags are armed and
    /// the teacher's entry is appended before the frame goes out.
    pub fn send_teacher_input(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        if !self.store.is_connected() {
            self.store
                .set_error(Some("Not connected. Reconnecting…".to_string()));
            return Err(ClientError::NotConnected);
        }

        self.store.set_responded_this_turn(false);
        self.store.set_processing(true);
        self.store.set_error(None);
        self.store.append_entry(ConversationEntry::teacher(&text));

        self.outbound_tx
            .send(ClientFrame::TeacherInput {
                session_id: self.session_id.clone(),
                text,
            })
            .map_err(|_| ClientError::ChannelClosed)
    }

    /// Notify the server the teacher is ending the session.
    ///
    /// Best-effort: if the socket is down the server-side cleanup happens via
    /// the REST end call instead, so a closed channel is just logged.
    pub fn send_session_end(&self) {
        if !self.store.is_connected() {
            debug!("session_end not sent, transport closed");
            return;
        }
        if self
            .outbound_tx
            .send(ClientFrame::SessionEnd {
                session_id: self.session_id.clone(),
            })
            .is_err()
        {
            debug!("session_end not sent, connection task stopped");
        }
    }

    /// Session this manager is attached to.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop reconnecting, close the socket, and wait for the task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if self.task.await.is_err() {
            warn!("connection task panicked during shutdown");
        }
        self.store.set_connected(false);
    }
}

/// Connect-serve-reconnect loop.
async fn run_connection(
    url: String,
    reconnect_delay: Duration,
    store: Arc<SessionStore>,
    dispatcher: Dispatcher,
    mut outbound_rx: mpsc::UnboundedReceiver<ClientFrame>,
    cancel: CancellationToken,
) {
    loop {
        let connected = tokio::select! {
            () = cancel.cancelled() => return,
            result = connect_async(&url) => result,
        };

        match connected {
            Ok((ws, _)) => {
                info!(%url, "session stream connected");
                store.set_connected(true);
                store.set_error(None);
                serve_socket(ws, &store, &dispatcher, &mut outbound_rx, &cancel).await;
                store.set_connected(false);
                store.set_processing(false);
            }
            Err(e) => {
                warn!(%url, error = %e, "session stream connect failed");
                store.set_error(Some(format!("Connection failed: {e}")));
            }
        }

        if cancel.is_cancelled() || store.phase() == SessionPhase::Ended {
            return;
        }
        debug!(?reconnect_delay, "reconnecting after delay");
        tokio::select! {
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(reconnect_delay) => {}
        }
    }
}

/// Pump one open socket until it closes or the manager is cancelled.
async fn serve_socket(
    ws: WsStream,
    store: &Arc<SessionStore>,
    dispatcher: &Dispatcher,
    outbound_rx: &mut mpsc::UnboundedReceiver<ClientFrame>,
    cancel: &CancellationToken,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                return;
            }
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { return };
                if let Err(e) = ws_tx.send(Message::Text(frame.to_wire().into())).await {
                    warn!(error = %e, "outbound send failed, dropping socket");
                    return;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => dispatcher.dispatch_raw(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("session stream closed by server");
                        return;
                    }
                    Some(Ok(_)) => {} // ping/pong/binary
                    Some(Err(e)) => {
                        warn!(error = %e, "session stream read error");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    use teachlab_core::session::Speaker;

    use crate::audio::{AudioSequencer, NullSink};

    /// One-connection-at-a-time echo-less server: forwards inbound text
    /// frames to `inbound_tx`, writes strings from `to_send_rx` to the
    /// client, and hangs up when `to_send_rx` closes.
    async fn serve_once(
        listener: &TcpListener,
        inbound_tx: mpsc::UnboundedSender<serde_json::Value>,
        mut to_send_rx: mpsc::UnboundedReceiver<String>,
    ) {
        let (stream, _) = listener.accept().await.unwrap();
        let ws = accept_async(stream).await.unwrap();
        let (mut tx, mut rx) = ws.split();
        loop {
            tokio::select! {
                out = to_send_rx.recv() => match out {
                    Some(text) => tx.send(Message::Text(text.into())).await.unwrap(),
                    None => {
                        let _ = tx.send(Message::Close(None)).await;
                        return;
                    }
                },
                msg = rx.next() => match msg {
                    Some(Ok(Message::Text(text))) => {
                        let _ = inbound_tx.send(serde_json::from_str(&text).unwrap());
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    _ => {}
                },
            }
        }
    }

    struct Fixture {
        store: Arc<SessionStore>,
        manager: ConnectionManager,
        sequencer: AudioSequencer,
        inbound_rx: mpsc::UnboundedReceiver<serde_json::Value>,
        to_send_tx: mpsc::UnboundedSender<String>,
        server: JoinHandle<()>,
    }

    async fn fixture(reconnect_delay_ms: u64) -> Fixture {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (to_send_tx, to_send_rx) = mpsc::unbounded_channel();
        let server = tokio::spawn(async move {
            serve_once(&listener, inbound_tx, to_send_rx).await;
        });

        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));
        let dispatcher = Dispatcher::new(Arc::clone(&store), sequencer.handle());
        let settings = StreamSettings {
            url: format!("ws://{addr}"),
            reconnect_delay_ms,
        };
        let manager =
            ConnectionManager::spawn(Arc::clone(&store), dispatcher, &settings, "sess-1");
        Fixture {
            store,
            manager,
            sequencer,
            inbound_rx,
            to_send_tx,
            server,
        }
    }

    async fn wait_until(store: &SessionStore, connected: bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while store.is_connected() != connected {
            assert!(tokio::time::Instant::now() < deadline, "flag never settled");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn connect_sets_flag() {
        let fx = fixture(5_000).await;
        wait_until(&fx.store, true).await;
        assert!(fx.store.error().is_none());
        fx.manager.shutdown().await;
        fx.sequencer.shutdown().await;
        fx.server.abort();
    }

    #[tokio::test]
    async fn inbound_frames_reach_the_dispatcher() {
        let mut fx = fixture(5_000).await;
        wait_until(&fx.store, true).await;

        fx.to_send_tx
            .send(r#"{"type": "error", "message": "from server"}"#.into())
            .unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while fx.store.error().as_deref() != Some("from server") {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        fx.manager.shutdown().await;
        fx.sequencer.shutdown().await;
        let _ = fx.inbound_rx.try_recv();
        fx.server.abort();
    }

    #[tokio::test]
    async fn teacher_input_goes_out_as_tagged_json() {
        let mut fx = fixture(5_000).await;
        wait_until(&fx.store, true).await;

        fx.manager.send_teacher_input("What is photosynthesis?").unwrap();

        let frame = fx.inbound_rx.recv().await.unwrap();
        assert_eq!(frame["type"], "teacher_input");
        assert_eq!(frame["session_id"], "sess-1");
        assert_eq!(frame["text"], "What is photosynthesis?");

        // Local effects applied before the frame went out
        assert!(fx.store.is_processing());
        let log = fx.store.conversation();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].speaker, Speaker::Teacher);

        fx.manager.shutdown().await;
        fx.sequencer.shutdown().await;
        fx.server.abort();
    }

    #[tokio::test]
    async fn send_while_disconnected_fails_without_logging_a_turn() {
        // Point at a listener that never accepts the handshake
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));
        let dispatcher = Dispatcher::new(Arc::clone(&store), sequencer.handle());
        let settings = StreamSettings {
            url: format!("ws://{addr}"),
            reconnect_delay_ms: 60_000,
        };
        let manager =
            ConnectionManager::spawn(Arc::clone(&store), dispatcher, &settings, "sess-1");

        let err = manager.send_teacher_input("hello?").unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
        assert!(store.conversation().is_empty());
        assert!(!store.is_processing());
        assert!(store.error().is_some());

        manager.shutdown().await;
        sequencer.shutdown().await;
    }

    #[tokio::test]
    async fn session_end_frame_is_sent_when_connected() {
        let mut fx = fixture(5_000).await;
        wait_until(&fx.store, true).await;

        fx.manager.send_session_end();
        let frame = fx.inbound_rx.recv().await.unwrap();
        assert_eq!(frame["type"], "session_end");
        assert_eq!(frame["session_id"], "sess-1");

        fx.manager.shutdown().await;
        fx.sequencer.shutdown().await;
        fx.server.abort();
    }

    #[tokio::test]
    async fn server_drop_clears_flags_and_schedules_reconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (inbound_tx, _inbound_rx) = mpsc::unbounded_channel();
        let (to_send_tx, to_send_rx) = mpsc::unbounded_channel();
        let (inbound_tx2, _inbound_rx2) = mpsc::unbounded_channel();
        let (_to_send_tx2, to_send_rx2) = mpsc::unbounded_channel::<String>();

        // First connection is closed by dropping its sender; then the server
        // accepts a second connection and holds it open.
        let server = tokio::spawn(async move {
            serve_once(&listener, inbound_tx, to_send_rx).await;
            serve_once(&listener, inbound_tx2, to_send_rx2).await;
        });

        let store = Arc::new(SessionStore::new());
        let sequencer = AudioSequencer::spawn(Arc::clone(&store), Arc::new(NullSink));
        let dispatcher = Dispatcher::new(Arc::clone(&store), sequencer.handle());
        let settings = StreamSettings {
            url: format!("ws://{addr}"),
            reconnect_delay_ms: 50,
        };
        let manager =
            ConnectionManager::spawn(Arc::clone(&store), dispatcher, &settings, "sess-1");

        wait_until(&store, true).await;
        store.set_processing(true);

        // Server hangs up
        drop(to_send_tx);
        wait_until(&store, false).await;
        assert!(!store.is_processing());

        // Fixed delay later, the stream is back
        wait_until(&store, true).await;

        manager.shutdown().await;
        sequencer.shutdown().await;
        server.abort();
    }

    #[tokio::test]
    async fn shutdown_stops_the_task_and_clears_connected() {
        let fx = fixture(50).await;
        wait_until(&fx.store, true).await;
        fx.manager.shutdown().await;
        assert!(!fx.store.is_connected());
        fx.sequencer.shutdown().await;
        fx.server.abort();
    }
}
