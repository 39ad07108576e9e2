use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, watch};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::backoff::{ReconnectDecision, ReconnectState};
use crate::config::ChannelConfig;
use crate::connection::{Connection, Connector, TransportEvent, WebSocketConnector};
use crate::error::ChannelError;
use crate::event::{Event, EventPayload, HandlerTable};
use crate::message::{InboundMessage, OutboundMessage, Role, SessionId};

/// Error text raised when a send is attempted without an open connection
pub const NOT_CONNECTED: &str = "WebSocket is not connected";

/// Observable lifecycle of a channel client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Reconnecting { attempt: u32, delay: Duration },
    /// Closed on request; no further attempts
    Closed,
    /// Gave up after the maximum number of reconnect attempts
    Exhausted,
}

/// Builder for a [`ChannelClient`]
pub struct ChannelClientBuilder {
    session_id: SessionId,
    role: Role,
    config: ChannelConfig,
    connector: Arc<dyn Connector>,
    handlers: HandlerTable,
}

impl ChannelClientBuilder {
    /// Use a different transport
    pub fn connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    /// Register a handler before the first connection attempt
    pub fn on<F>(mut self, event: Event, handler: F) -> Self
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.handlers.on(event, handler);
        self
    }

    /// Spawn the connection driver and return the client.
    ///
    /// Never fails: an unreachable server or a bad endpoint goes through the
    /// reconnect path and eventually raises [`Event::MaxReconnectAttempts`].
    pub fn connect(self) -> ChannelClient {
        let endpoint = self.config.endpoint();
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            session_id: self.session_id,
            role: self.role,
            handlers: Mutex::new(self.handlers),
            writer: Mutex::new(None),
            reconnect: Mutex::new(ReconnectState::new(self.config.reconnect_policy())),
            state,
        });

        let driver = tokio::spawn(run(
            Arc::clone(&shared),
            self.connector,
            endpoint.as_ref().ok().cloned(),
            shutdown_rx,
        ));

        if let Err(e) = &endpoint {
            error!("Invalid channel endpoint: {}", e);
        }

        ChannelClient {
            endpoint: endpoint.ok(),
            shared,
            shutdown,
            driver: Mutex::new(Some(driver)),
        }
    }
}

/// Client for the real-time channel of one interview session.
///
/// Joins the session on every successful connect, dispatches inbound
/// messages to at most one handler per [`Event`], and reconnects with
/// exponential backoff until the attempt budget runs out.
pub struct ChannelClient {
    endpoint: Option<Url>,
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    driver: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl ChannelClient {
    pub fn builder(
        session_id: impl Into<SessionId>,
        role: Role,
        config: ChannelConfig,
    ) -> ChannelClientBuilder {
        ChannelClientBuilder {
            session_id: session_id.into(),
            role,
            config,
            connector: Arc::new(WebSocketConnector),
            handlers: HandlerTable::new(),
        }
    }

    /// Connect over WebSocket with no handlers registered yet
    pub fn new(session_id: impl Into<SessionId>, role: Role, config: ChannelConfig) -> Self {
        Self::builder(session_id, role, config).connect()
    }

    pub fn session_id(&self) -> &SessionId {
        &self.shared.session_id
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Receiver that observes every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.shared.reconnect.lock().await.attempts()
    }

    /// Register a handler, replacing any previous one for the same event
    pub async fn on<F>(&self, event: Event, handler: F)
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.shared.handlers.lock().await.on(event, handler);
    }

    pub async fn off(&self, event: Event) {
        self.shared.handlers.lock().await.off(event);
    }

    /// Send a message if the connection is open, otherwise raise [`Event::Error`]
    pub async fn send(&self, message: OutboundMessage) {
        self.shared.send(&message).await;
    }

    pub async fn send_transcription(&self, text: impl Into<String>) {
        let message = OutboundMessage::Transcription {
            interview_id: self.shared.session_id.clone(),
            text: text.into(),
        };
        self.shared.send(&message).await;
    }

    pub async fn send_analysis(&self, analysis: Value) {
        let message = OutboundMessage::Analysis {
            interview_id: self.shared.session_id.clone(),
            analysis,
        };
        self.shared.send(&message).await;
    }

    pub async fn send_question(&self, question: Value) {
        let message = OutboundMessage::Question {
            interview_id: self.shared.session_id.clone(),
            question,
        };
        self.shared.send(&message).await;
    }

    /// Signal shutdown without waiting for the driver.
    ///
    /// Safe to call from inside an event handler.
    pub fn request_close(&self) {
        self.shutdown.send_replace(true);
    }

    /// Close the connection and stop reconnecting.
    ///
    /// Cancels a pending reconnect delay. Must not be awaited from inside an
    /// event handler; use [`ChannelClient::request_close`] there.
    pub async fn close(&self) {
        self.request_close();

        let driver = self.driver.lock().await.take();
        if let Some(driver) = driver {
            if let Err(e) = driver.await {
                warn!("Channel driver ended abnormally: {}", e);
            }
            // an exhausted client stays exhausted
            self.shared.state.send_if_modified(|state| {
                if *state == ConnectionState::Exhausted || *state == ConnectionState::Closed {
                    return false;
                }
                *state = ConnectionState::Closed;
                true
            });
        }
    }
}

struct Shared {
    session_id: SessionId,
    role: Role,
    handlers: Mutex<HandlerTable>,
    writer: Mutex<Option<mpsc::UnboundedSender<String>>>,
    reconnect: Mutex<ReconnectState>,
    state: watch::Sender<ConnectionState>,
}

enum PumpOutcome {
    Lost,
    Shutdown,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    async fn trigger(&self, event: Event, payload: EventPayload) {
        // lock released before the call; handlers may spawn work that re-registers
        let handler = self.handlers.lock().await.get(event);
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    async fn send(&self, message: &OutboundMessage) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to encode outbound message: {}", e);
                self.trigger(Event::Error, EventPayload::Text(e.to_string()))
                    .await;
                return;
            }
        };

        let delivered = match &*self.writer.lock().await {
            Some(writer) => writer.send(frame).is_ok(),
            None => false,
        };

        if delivered {
            trace!("Sent message for session {}", message.session_id());
        } else {
            warn!("{}", NOT_CONNECTED);
            self.trigger(Event::Error, EventPayload::Text(NOT_CONNECTED.to_string()))
                .await;
        }
    }

    async fn on_open(&self, connection: &Connection) {
        self.reconnect.lock().await.reset();
        *self.writer.lock().await = Some(connection.writer());
        self.set_state(ConnectionState::Open);
        info!("WebSocket connected");

        let join = OutboundMessage::Join {
            interview_id: self.session_id.clone(),
            role: self.role,
        };
        self.send(&join).await;
        self.trigger(Event::Connect, EventPayload::None).await;
    }

    async fn pump(
        &self,
        connection: &mut Connection,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PumpOutcome {
        loop {
            let event = tokio::select! {
                event = connection.next_event() => event,
                _ = shutdown_requested(shutdown) => return PumpOutcome::Shutdown,
            };

            match event {
                Some(TransportEvent::Frame(frame)) => self.dispatch(&frame).await,
                Some(TransportEvent::Error(reason)) => {
                    error!("WebSocket error: {}", reason);
                    return PumpOutcome::Lost;
                }
                Some(TransportEvent::Closed) | None => {
                    info!("WebSocket disconnected");
                    return PumpOutcome::Lost;
                }
            }
        }
    }

    async fn dispatch(&self, frame: &str) {
        let message = match frame.parse::<InboundMessage>() {
            Ok(message) => message,
            Err(e) => {
                warn!("Error parsing WebSocket message: {}", e);
                return;
            }
        };

        if let InboundMessage::Unknown { tag } = &message {
            warn!("Unknown message type: {:?}", tag);
            return;
        }

        if let Some((event, payload)) = message.into_event() {
            debug!("Dispatching {} event", event);
            self.trigger(event, payload).await;
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // a dropped client counts as a shutdown request
    let _ = shutdown.wait_for(|closing| *closing).await;
}

async fn open(connector: &dyn Connector, endpoint: Option<&Url>) -> Result<Connection, ChannelError> {
    match endpoint {
        Some(url) => connector.open(url).await,
        None => Err(ChannelError::ConnectionError(
            "no valid endpoint configured".to_string(),
        )),
    }
}

async fn run(
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    endpoint: Option<Url>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        shared.set_state(ConnectionState::Connecting);

        let opened = tokio::select! {
            opened = open(&*connector, endpoint.as_ref()) => opened,
            _ = shutdown_requested(&mut shutdown) => break,
        };

        match opened {
            Ok(mut connection) => {
                shared.on_open(&connection).await;
                let outcome = shared.pump(&mut connection, &mut shutdown).await;

                shared.writer.lock().await.take();
                drop(connection);
                // disconnect handlers must not observe a stale Open
                shared.set_state(match outcome {
                    PumpOutcome::Lost => ConnectionState::Connecting,
                    PumpOutcome::Shutdown => ConnectionState::Closed,
                });
                shared.trigger(Event::Disconnect, EventPayload::None).await;

                if let PumpOutcome::Shutdown = outcome {
                    break;
                }
            }
            Err(e) => {
                warn!("Connection attempt failed: {}", e);
                shared.trigger(Event::Disconnect, EventPayload::None).await;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        let decision = shared.reconnect.lock().await.next();
        match decision {
            ReconnectDecision::Retry { attempt, delay } => {
                let max_attempts = shared.reconnect.lock().await.policy().max_attempts;
                warn!(
                    "Attempting to reconnect in {:?} ({}/{})",
                    delay, attempt, max_attempts
                );
                shared.set_state(ConnectionState::Reconnecting { attempt, delay });

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }
            ReconnectDecision::Exhausted => {
                error!("Max reconnection attempts reached");
                shared.set_state(ConnectionState::Exhausted);
                shared
                    .trigger(Event::MaxReconnectAttempts, EventPayload::None)
                    .await;
                return;
            }
        }
    }

    info!("Channel client for session {} closed", shared.session_id);
    shared.set_state(ConnectionState::Closed);
}
