//! Contracts for the external services an interview session relies on.
//!
//! Identity, persistence and analysis all live outside this crate. These
//! traits are the seam: [`crate::relay`] and [`crate::feedback`] are written
//! against them, and the HTTP analysis client in [`crate::backend`] is one
//! implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;
use crate::message::SessionId;

/// Collection holding interview records
pub const INTERVIEWS_COLLECTION: &str = "interviews";

//=========================================================================================
// Identity
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: User,
    pub id_token: String,
}

pub type AuthStateCallback = Box<dyn Fn(Option<User>) + Send + Sync>;

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, ChannelError>;

    async fn sign_out(&self) -> Result<(), ChannelError>;

    fn current_user(&self) -> Option<User>;

    /// Called with the new user (or `None`) whenever sign-in state changes
    fn on_auth_state_changed(&self, callback: AuthStateCallback);
}

//=========================================================================================
// Document store
//=========================================================================================

/// A field written to the document store
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Filled in by the store with its own clock when the write lands
    ServerTimestamp,
    Map(Fields),
}

pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub equals: Value,
}

impl Filter {
    pub fn equal(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            equals: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a record and return its store-assigned id
    async fn create(&self, collection: &str, record: Fields) -> Result<String, ChannelError>;

    async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<(), ChannelError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredDocument>, ChannelError>;

    async fn query(
        &self,
        collection: &str,
        filters: &[Filter],
        order: Option<&Order>,
    ) -> Result<Vec<StoredDocument>, ChannelError>;
}

//=========================================================================================
// Transcription & analysis backend
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub technical_score: f64,
    pub communication_score: f64,
    pub engagement_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    #[serde(flatten)]
    pub scores: Scores,
    #[serde(default)]
    pub key_insights: Vec<String>,
    /// Per-segment scores, oldest first
    #[serde(default)]
    pub segments: Vec<Scores>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FraudCheck {
    pub fraud_detected: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Interview settings; fields the backend omits keep their defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewConfig {
    /// `technical` or `behavioral`
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    /// Minutes
    pub duration: u32,
    pub question_count: u32,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            kind: "technical".to_string(),
            level: "senior".to_string(),
            duration: 45,
            question_count: 5,
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewQuestion {
    pub id: String,
    pub text: String,
    /// Anything else the generator attached, broadcast along with the question
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseAnalysisRequest {
    pub transcript: String,
    pub question_id: String,
    pub interview_type: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudEvent {
    /// RFC 3339 time the frame was flagged
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub confidence: Option<f64>,
}

impl FraudEvent {
    /// Record a positive check, or `None` for a clean frame
    pub fn from_check(check: &FraudCheck, timestamp: impl Into<String>) -> Option<Self> {
        check.fraud_detected.then(|| Self {
            timestamp: timestamp.into(),
            kind: check.kind.clone(),
            confidence: check.confidence,
        })
    }
}

/// Final interview data posted when the session ends
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewCompletion {
    /// Questions asked, each with whatever analysis it collected
    pub questions: Vec<Value>,
    pub fraud_detection_events: Vec<FraudEvent>,
    pub duration: u32,
    pub completed_at: String,
}

/// Interviewer ratings and notes sent for an AI summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub interview_id: SessionId,
    pub technical_skills: u8,
    pub communication_skills: u8,
    pub notes: String,
}

#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn transcribe_segment(
        &self,
        interview_id: &SessionId,
        segment_number: u32,
        audio: Vec<u8>,
    ) -> Result<Transcription, ChannelError>;

    async fn analyze(&self, interview_id: &SessionId) -> Result<AnalysisReport, ChannelError>;

    /// Check one captured video frame (a data URL)
    async fn detect_fraud(&self, frame: &str) -> Result<FraudCheck, ChannelError>;

    async fn interview_config(&self, interview_id: &SessionId)
    -> Result<InterviewConfig, ChannelError>;

    async fn generate_questions(
        &self,
        config: &InterviewConfig,
    ) -> Result<Vec<InterviewQuestion>, ChannelError>;

    /// Score one answer against the question it responds to
    async fn analyze_response(&self, request: &ResponseAnalysisRequest)
    -> Result<Value, ChannelError>;

    async fn complete_interview(&self, completion: &InterviewCompletion)
    -> Result<(), ChannelError>;

    /// AI summary of the interviewer's feedback
    async fn generate_feedback(&self, request: &FeedbackRequest) -> Result<String, ChannelError>;
}
