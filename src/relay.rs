use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::ChannelClient;
use crate::error::ChannelError;
use crate::ports::{AnalysisBackend, AnalysisReport, InterviewQuestion, Transcription};

/// Transcripts longer than this trigger a full analysis
pub const ANALYSIS_THRESHOLD_CHARS: usize = 50;

/// Result of relaying one audio segment
#[derive(Debug, Clone, PartialEq)]
pub struct RelayOutcome {
    pub segment_number: u32,
    pub transcription: Transcription,
    pub analysis: Option<AnalysisReport>,
}

/// Pushes recorded audio segments through the analysis backend and shares
/// the results with the other participants over the session channel.
pub struct SegmentRelay<B> {
    backend: B,
    channel: Arc<ChannelClient>,
    next_segment: u32,
}

impl<B: AnalysisBackend> SegmentRelay<B> {
    pub fn new(backend: B, channel: Arc<ChannelClient>) -> Self {
        Self {
            backend,
            channel,
            next_segment: 0,
        }
    }

    /// Number the next segment will be uploaded with
    pub fn next_segment(&self) -> u32 {
        self.next_segment
    }

    /// Transcribe one segment, broadcast the text and, for long enough
    /// transcripts, broadcast a fresh analysis.
    ///
    /// A failed analysis is logged and reported as `analysis: None`; only a
    /// failed transcription is an error. Segment numbers are consumed either way.
    pub async fn relay_segment(&mut self, audio: Vec<u8>) -> Result<RelayOutcome, ChannelError> {
        let segment_number = self.next_segment;
        self.next_segment += 1;

        let session_id = self.channel.session_id().clone();
        let transcription = self
            .backend
            .transcribe_segment(&session_id, segment_number, audio)
            .await?;

        debug!(
            "Segment {} transcribed ({} chars)",
            segment_number,
            transcription.text.chars().count()
        );
        self.channel
            .send_transcription(transcription.text.clone())
            .await;

        let analysis = if transcription.text.chars().count() > ANALYSIS_THRESHOLD_CHARS {
            match self.backend.analyze(&session_id).await {
                Ok(report) => {
                    self.channel.send_analysis(serde_json::to_value(&report)?).await;
                    Some(report)
                }
                Err(e) => {
                    warn!("Analysis for session {} failed: {}", session_id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(RelayOutcome {
            segment_number,
            transcription,
            analysis,
        })
    }

    /// Share a generated question with the other participants
    pub async fn broadcast_question(&self, question: &InterviewQuestion) -> Result<(), ChannelError> {
        self.channel
            .send_question(serde_json::to_value(question)?)
            .await;
        Ok(())
    }
}
