//! Interviewer feedback stored on the interview record.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ChannelError;
use crate::message::SessionId;
use crate::ports::{DocumentStore, FieldValue, Fields, INTERVIEWS_COLLECTION, IdentityProvider};

/// Field of the interview record that holds the feedback
pub const FEEDBACK_FIELD: &str = "feedback";

/// Ratings, notes and the AI summary an interviewer saves for a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewFeedback {
    /// 1 to 5
    pub technical_skills: u8,
    /// 1 to 5
    pub communication_skills: u8,
    pub notes: String,
    #[serde(default)]
    pub ai_summary: String,
}

/// Write `interviews/{id}.feedback`, stamped with the signed-in user and the
/// store's clock.
pub async fn save_feedback(
    interview_id: &SessionId,
    feedback: &InterviewFeedback,
    identity: &dyn IdentityProvider,
    store: &dyn DocumentStore,
) -> Result<(), ChannelError> {
    let user = identity.current_user().ok_or(ChannelError::Unauthenticated)?;

    let mut fields: Fields = match serde_json::to_value(feedback)? {
        Value::Object(map) => map
            .into_iter()
            .map(|(key, value)| (key, FieldValue::Value(value)))
            .collect(),
        _ => Fields::new(),
    };
    fields.insert("updatedAt".to_string(), FieldValue::ServerTimestamp);
    fields.insert(
        "updatedBy".to_string(),
        FieldValue::Value(Value::String(user.uid.clone())),
    );

    let mut patch = Fields::new();
    patch.insert(FEEDBACK_FIELD.to_string(), FieldValue::Map(fields));

    store
        .update(INTERVIEWS_COLLECTION, interview_id.as_str(), patch)
        .await?;

    info!("Saved feedback for interview {} by {}", interview_id, user.uid);
    Ok(())
}

/// Feedback saved so far, or `None` when the interview has none yet.
///
/// A missing interview record is an error.
pub async fn load_feedback(
    interview_id: &SessionId,
    store: &dyn DocumentStore,
) -> Result<Option<InterviewFeedback>, ChannelError> {
    let record = store
        .get(INTERVIEWS_COLLECTION, interview_id.as_str())
        .await?
        .ok_or_else(|| ChannelError::NotFound {
            collection: INTERVIEWS_COLLECTION.to_string(),
            id: interview_id.to_string(),
        })?;

    match record.data.get(FEEDBACK_FIELD) {
        None | Some(Value::Null) => {
            debug!("Interview {} has no feedback yet", interview_id);
            Ok(None)
        }
        Some(feedback) => Ok(Some(serde_json::from_value(feedback.clone())?)),
    }
}
