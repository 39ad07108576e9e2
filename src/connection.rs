use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::AbortHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::ChannelError;

/// Something that happened on an open transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Frame(String),
    Error(String),
    Closed,
}

/// One open transport connection.
///
/// Outgoing frames go through an unbounded channel so writes never block the
/// caller. Dropping the connection drops the writer, which closes the socket.
pub struct Connection {
    writer: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    tasks: Vec<AbortHandle>,
}

impl Connection {
    pub fn new(
        writer: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self::with_tasks(writer, events, Vec::new())
    }

    /// Connection whose background tasks are aborted when it is dropped
    pub(crate) fn with_tasks(
        writer: mpsc::UnboundedSender<String>,
        events: mpsc::UnboundedReceiver<TransportEvent>,
        tasks: Vec<AbortHandle>,
    ) -> Self {
        Self {
            writer,
            events,
            tasks,
        }
    }

    /// In-memory connection and the remote end that drives it
    pub fn pair() -> (Self, Peer) {
        let (writer, frames) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();

        (
            Self::new(writer, events),
            Peer {
                frames,
                events: events_tx,
            },
        )
    }

    pub(crate) fn writer(&self) -> mpsc::UnboundedSender<String> {
        self.writer.clone()
    }

    /// Next transport event; `None` once the transport is gone
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

/// Remote side of an in-memory [`Connection`]
pub struct Peer {
    frames: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl Peer {
    /// Deliver a text frame to the client
    pub fn push_frame(&self, frame: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Frame(frame.into())).is_ok()
    }

    /// Report a transport error to the client
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        self.events.send(TransportEvent::Error(reason.into())).is_ok()
    }

    /// Close the connection from the remote side
    pub fn close(self) {
        let _ = self.events.send(TransportEvent::Closed);
    }

    /// Next frame written by the client; `None` once the client dropped the connection
    pub async fn next_frame(&mut self) -> Option<String> {
        self.frames.recv().await
    }

    /// Frames written so far, without waiting
    pub fn drain_frames(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.frames.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

/// Opens transport connections for a channel client
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &Url) -> Result<Connection, ChannelError>;
}

/// Connector backed by tokio-tungstenite
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn open(&self, url: &Url) -> Result<Connection, ChannelError> {
        info!("Connecting to interview channel at {}", url);

        let (ws_stream, response) = connect_async(url.as_str()).await.map_err(|e| {
            error!("Failed to connect to WebSocket server: {}", e);
            e
        })?;

        debug!("Connected to WebSocket server. Response: {:?}", response.status());

        let (sink, mut stream) = ws_stream.split();
        let sink = Arc::new(Mutex::new(sink));
        let (writer, mut outgoing) = mpsc::unbounded_channel::<String>();
        let (events_tx, events) = mpsc::unbounded_channel();

        // Task for sending frames
        let send_sink = Arc::clone(&sink);
        let send_task = tokio::spawn(async move {
            while let Some(frame) = outgoing.recv().await {
                if let Err(e) = send_sink.lock().await.send(Message::Text(frame)).await {
                    error!("Error sending message: {}", e);
                    return;
                }
            }

            // Writer dropped: the client is done with this connection
            if let Err(e) = send_sink.lock().await.send(Message::Close(None)).await {
                debug!("Error sending close frame: {}", e);
            }
        });

        // Task for receiving frames
        let receive_sink = Arc::clone(&sink);
        let receive_events = events_tx.clone();
        let receive_task = tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        trace!("Received frame: {}", text);
                        if receive_events.send(TransportEvent::Frame(text)).is_err() {
                            return;
                        }
                    }
                    Ok(Message::Ping(data)) => {
                        if let Err(e) = receive_sink.lock().await.send(Message::Pong(data)).await {
                            error!("Failed to send pong: {}", e);
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Server closed the connection: {:?}", frame);
                        break;
                    }
                    Ok(_) => trace!("Ignoring non-text frame"),
                    Err(e) => {
                        let _ = receive_events.send(TransportEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        });

        let receive_abort = receive_task.abort_handle();
        let supervisor = tokio::spawn(async move {
            let reader = receive_task.abort_handle();
            tokio::select! {
                _ = send_task => {
                    warn!("Send task completed");
                    // the read half must not keep a dead socket alive
                    reader.abort();
                }
                _ = receive_task => debug!("Receive task completed"),
            }

            let _ = events_tx.send(TransportEvent::Closed);
        });

        // The send task is left to flush a Close frame once the writer drops.
        Ok(Connection::with_tasks(
            writer,
            events,
            vec![supervisor.abort_handle(), receive_abort],
        ))
    }
}
