//! Real-time channel client for live interview sessions.
//!
//! A [`ChannelClient`] keeps one WebSocket connection to the session server,
//! joins the interview on every connect, hands inbound messages to per-event
//! handlers and reconnects with exponential backoff. The [`ports`] module
//! describes the external services an interview page talks to. [`backend`]
//! and [`relay`] provide the HTTP analysis client and the glue that
//! broadcasts its results over the channel, and [`feedback`] keeps the
//! interviewer's notes on the interview record.

pub mod backend;
pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod feedback;
pub mod message;
pub mod ports;
pub mod relay;

pub use backend::{BackendConfig, HttpAnalysisBackend};
pub use backoff::{ReconnectDecision, ReconnectPolicy, ReconnectState};
pub use client::{ChannelClient, ChannelClientBuilder, ConnectionState, NOT_CONNECTED};
pub use config::ChannelConfig;
pub use connection::{Connection, Connector, Peer, TransportEvent, WebSocketConnector};
pub use error::ChannelError;
pub use event::{Event, EventPayload, Handler, HandlerTable};
pub use feedback::{InterviewFeedback, load_feedback, save_feedback};
pub use message::{InboundMessage, OutboundMessage, Role, SessionId};
pub use relay::SegmentRelay;
