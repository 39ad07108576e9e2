use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::error::ChannelError;
use crate::message::InboundMessage;

/// Events a channel client raises to its handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    Connect,
    Disconnect,
    Transcription,
    Analysis,
    ParticipantJoined,
    Question,
    Error,
    MaxReconnectAttempts,
}

impl Event {
    pub const ALL: [Event; 8] = [
        Event::Connect,
        Event::Disconnect,
        Event::Transcription,
        Event::Analysis,
        Event::ParticipantJoined,
        Event::Question,
        Event::Error,
        Event::MaxReconnectAttempts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Event::Connect => "connect",
            Event::Disconnect => "disconnect",
            Event::Transcription => "transcription",
            Event::Analysis => "analysis",
            Event::ParticipantJoined => "participantJoined",
            Event::Question => "question",
            Event::Error => "error",
            Event::MaxReconnectAttempts => "maxReconnectAttempts",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Event {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Event::ALL
            .into_iter()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| ChannelError::ConfigError(format!("unknown event: {s}")))
    }
}

/// Data handed to an event handler
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    None,
    Text(String),
    Json(Value),
}

impl EventPayload {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            EventPayload::Json(value) => Some(value),
            _ => None,
        }
    }
}

impl InboundMessage {
    /// Route a parsed message to the event it raises. Unknown tags route nowhere.
    pub fn into_event(self) -> Option<(Event, EventPayload)> {
        match self {
            InboundMessage::Connection(whole) => Some((Event::Connect, EventPayload::Json(whole))),
            InboundMessage::Transcription { text } => {
                Some((Event::Transcription, EventPayload::Text(text)))
            }
            InboundMessage::Analysis { analysis } => {
                Some((Event::Analysis, EventPayload::Json(analysis)))
            }
            InboundMessage::ParticipantJoined(whole) => {
                Some((Event::ParticipantJoined, EventPayload::Json(whole)))
            }
            InboundMessage::Question { question } => {
                Some((Event::Question, EventPayload::Json(question)))
            }
            InboundMessage::Error { message } => Some((Event::Error, EventPayload::Text(message))),
            InboundMessage::Unknown { .. } => None,
        }
    }
}

/// Callback invoked when an event fires
pub type Handler = Arc<dyn Fn(EventPayload) + Send + Sync>;

/// At most one handler per event; registering again replaces the previous one
#[derive(Default, Clone)]
pub struct HandlerTable {
    handlers: HashMap<Event, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, event: Event, handler: F)
    where
        F: Fn(EventPayload) + Send + Sync + 'static,
    {
        self.handlers.insert(event, Arc::new(handler));
    }

    pub fn off(&mut self, event: Event) {
        self.handlers.remove(&event);
    }

    pub fn get(&self, event: Event) -> Option<Handler> {
        self.handlers.get(&event).cloned()
    }

    pub fn contains(&self, event: Event) -> bool {
        self.handlers.contains_key(&event)
    }

    /// Invoke the handler for `event`, if any
    pub fn trigger(&self, event: Event, payload: EventPayload) {
        if let Some(handler) = self.get(event) {
            handler(payload);
        }
    }
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}
