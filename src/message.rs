use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;

/// Opaque identifier of one interview session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which side of the interview this participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Interviewer,
    Candidate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Interviewer => "interviewer",
            Role::Candidate => "candidate",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interviewer" => Ok(Role::Interviewer),
            "candidate" => Ok(Role::Candidate),
            other => Err(ChannelError::ConfigError(format!("unknown role: {other}"))),
        }
    }
}

/// A message received from the server, one per text frame.
///
/// Tags outside the known set land in [`InboundMessage::Unknown`] instead of
/// failing the parse, so the caller decides how loudly to drop them.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Server-side acknowledgement of the connection; carries the whole message
    Connection(Value),
    Transcription { text: String },
    Analysis { analysis: Value },
    /// Another participant joined; carries the whole message
    ParticipantJoined(Value),
    Question { question: Value },
    Error { message: String },
    Unknown { tag: Option<String> },
}

#[derive(Deserialize)]
struct TextBody {
    text: String,
}

#[derive(Deserialize)]
struct AnalysisBody {
    analysis: Value,
}

#[derive(Deserialize)]
struct QuestionBody {
    question: Value,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Value,
}

impl InboundMessage {
    /// Classify an already-decoded JSON value by its `type` field
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let tag = value.get("type").and_then(Value::as_str).map(str::to_owned);

        let message = match tag.as_deref() {
            Some("connection") => InboundMessage::Connection(value),
            Some("transcription") => {
                let TextBody { text } = serde_json::from_value(value)?;
                InboundMessage::Transcription { text }
            }
            Some("analysis") => {
                let AnalysisBody { analysis } = serde_json::from_value(value)?;
                InboundMessage::Analysis { analysis }
            }
            Some("participant_joined") => InboundMessage::ParticipantJoined(value),
            Some("question") => {
                let QuestionBody { question } = serde_json::from_value(value)?;
                InboundMessage::Question { question }
            }
            Some("error") => {
                let ErrorBody { message } = serde_json::from_value(value)?;
                // servers sometimes send a structured error; keep it as its JSON text
                let message = match message {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                InboundMessage::Error { message }
            }
            _ => InboundMessage::Unknown { tag },
        };

        Ok(message)
    }

    /// The wire tag this message was parsed from
    pub fn tag(&self) -> Option<&str> {
        match self {
            InboundMessage::Connection(_) => Some("connection"),
            InboundMessage::Transcription { .. } => Some("transcription"),
            InboundMessage::Analysis { .. } => Some("analysis"),
            InboundMessage::ParticipantJoined(_) => Some("participant_joined"),
            InboundMessage::Question { .. } => Some("question"),
            InboundMessage::Error { .. } => Some("error"),
            InboundMessage::Unknown { tag } => tag.as_deref(),
        }
    }
}

impl FromStr for InboundMessage {
    type Err = ChannelError;

    fn from_str(frame: &str) -> Result<Self, Self::Err> {
        let value: Value = serde_json::from_str(frame)?;
        Ok(Self::from_value(value)?)
    }
}

/// A message sent to the server. Every variant names its session explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Join {
        #[serde(rename = "interviewId")]
        interview_id: SessionId,
        role: Role,
    },
    Transcription {
        #[serde(rename = "interviewId")]
        interview_id: SessionId,
        text: String,
    },
    Analysis {
        #[serde(rename = "interviewId")]
        interview_id: SessionId,
        analysis: Value,
    },
    Question {
        #[serde(rename = "interviewId")]
        interview_id: SessionId,
        question: Value,
    },
}

impl OutboundMessage {
    pub fn session_id(&self) -> &SessionId {
        match self {
            OutboundMessage::Join { interview_id, .. }
            | OutboundMessage::Transcription { interview_id, .. }
            | OutboundMessage::Analysis { interview_id, .. }
            | OutboundMessage::Question { interview_id, .. } => interview_id,
        }
    }

    pub fn to_frame(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }
}
