use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;

use flowprep_types::{ClientMessage, ConnectionStatus, ServerMessage};

mod config;
mod consts;
mod utils;

pub use config::TransportConfig;

type OutboundTx = tokio::sync::mpsc::Sender<ClientMessage>;
type EventTx = tokio::sync::broadcast::Sender<ServerMessage>;
pub type EventRx = tokio::sync::broadcast::Receiver<ServerMessage>;

/// One bidirectional connection to a live interview session.
///
/// Owns the socket handle exclusively. Inbound frames are decoded into
/// [`ServerMessage`] values and broadcast to subscribers; outbound messages
/// are fire-and-forget and silently dropped unless the status is
/// `Connected`. The transport never reconnects on its own; once the status
/// reaches `Ended` it stays there.
pub struct Transport {
    capacity: usize,
    config: TransportConfig,
    status: Arc<watch::Sender<ConnectionStatus>>,
    event_tx: EventTx,
    out_tx: Option<OutboundTx>,
    send_handle: Option<tokio::task::JoinHandle<()>>,
    recv_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Transport {
    pub fn new(capacity: usize, config: TransportConfig) -> Self {
        let (event_tx, _) = tokio::sync::broadcast::channel(capacity);
        let (status_tx, _) = watch::channel(ConnectionStatus::Idle);
        Self {
            capacity,
            config,
            status: Arc::new(status_tx),
            event_tx,
            out_tx: None,
            send_handle: None,
            recv_handle: None,
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Watches status transitions. A connection that dies without a
    /// `session_end` frame produces no event, so the drop to `Ended` is
    /// only observable here; session loops watch this to terminate instead
    /// of blocking on an event channel that will never deliver again.
    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Subscribes to decoded inbound frames. Subscribe before calling
    /// [`Transport::connect`]: the server sends its opening question as soon
    /// as the socket is accepted.
    pub fn events(&self) -> EventRx {
        self.event_tx.subscribe()
    }

    /// Opens the session socket. A missing session id is a no-op. A failed
    /// open collapses into the terminal `Ended` status rather than an error;
    /// only misuse (connecting an already-live or already-ended transport)
    /// returns `Err`.
    pub async fn connect(&mut self, session_id: &str) -> anyhow::Result<()> {
        if session_id.is_empty() {
            tracing::debug!("no session id, skipping connect");
            return Ok(());
        }
        if self.out_tx.is_some() {
            return Err(anyhow::anyhow!("already connected"));
        }
        if self.status().is_terminal() {
            return Err(anyhow::anyhow!("transport already ended"));
        }

        set_status(&self.status, ConnectionStatus::Connecting);

        let request = utils::build_request(&self.config, session_id)?;
        let ws_stream = match tokio_tungstenite::connect_async(request).await {
            Ok((ws_stream, _)) => ws_stream,
            Err(e) => {
                tracing::warn!("failed to open session socket: {}", e);
                set_status(&self.status, ConnectionStatus::Ended);
                return Ok(());
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = tokio::sync::mpsc::channel(self.capacity);
        self.out_tx = Some(out_tx);

        let send_handle = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!("failed to send frame: {}", e);
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize outbound frame: {}", e);
                    }
                }
            }
        });

        let status = self.status.clone();
        let event_tx = self.event_tx.clone();
        let recv_handle = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Err(e) => {
                        tracing::warn!("failed to read frame: {}", e);
                        break;
                    }
                    Ok(message) => message,
                };
                match message {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(event) => {
                            if matches!(event, ServerMessage::Unknown) {
                                tracing::debug!("ignoring unrecognized frame: {}", text);
                            }
                            if matches!(event, ServerMessage::SessionEnd { .. }) {
                                set_status(&status, ConnectionStatus::Ended);
                            }
                            if event_tx.send(event).is_err() {
                                tracing::debug!("no event subscribers, frame dropped");
                            }
                        }
                        Err(e) => {
                            tracing::debug!("dropping malformed frame: {}", e);
                        }
                    },
                    Message::Binary(bin) => {
                        tracing::warn!("unexpected binary frame: {} bytes", bin.len());
                    }
                    Message::Close(reason) => {
                        tracing::info!("connection closed: {:?}", reason);
                        break;
                    }
                    _ => {}
                }
            }
            set_status(&status, ConnectionStatus::Ended);
        });

        self.send_handle = Some(send_handle);
        self.recv_handle = Some(recv_handle);
        set_status(&self.status, ConnectionStatus::Connected);
        Ok(())
    }

    /// Serializes and writes a message, but only while connected. Anything
    /// else drops the message; there is no outbound queueing across
    /// disconnects.
    pub async fn send(&self, message: ClientMessage) {
        if self.status() != ConnectionStatus::Connected {
            tracing::debug!("transport not connected, dropping outbound frame");
            return;
        }
        if let Some(tx) = &self.out_tx {
            if tx.send(message).await.is_err() {
                tracing::debug!("outbound channel closed, frame dropped");
            }
        }
    }

    /// Tears the connection down. Idempotent and safe on a transport that
    /// never connected.
    pub fn close(&mut self) {
        self.out_tx = None;
        if let Some(handle) = self.recv_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.send_handle.take() {
            handle.abort();
        }
        set_status(&self.status, ConnectionStatus::Ended);
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}

fn set_status(cell: &watch::Sender<ConnectionStatus>, next: ConnectionStatus) {
    cell.send_if_modified(|current| {
        // Ended is terminal, nothing overwrites it.
        if current.is_terminal() || *current == next {
            return false;
        }
        *current = next;
        true
    });
}
