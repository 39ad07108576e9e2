use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::error::ChannelError;
use crate::message::SessionId;
use crate::ports::{
    AnalysisBackend, AnalysisReport, FeedbackRequest, FraudCheck, InterviewCompletion,
    InterviewConfig, InterviewQuestion, ResponseAnalysisRequest, Transcription,
};

/// Where the analysis backend lives and how to authenticate against it
#[derive(Debug, Clone)]
pub struct BackendConfig {
    base_url: Url,
    auth_token: Option<String>,
}

impl BackendConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            auth_token: None,
        }
    }

    pub fn from_url(base_url: &str) -> Result<Self, ChannelError> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.auth_token = Some(token.to_string());
        self
    }
}

#[derive(Deserialize)]
struct TranscribeResponse {
    transcription: Transcription,
}

#[derive(Deserialize)]
struct FeedbackResponse {
    summary: String,
}

/// [`AnalysisBackend`] over the backend's HTTP API
pub struct HttpAnalysisBackend {
    config: BackendConfig,
    http_client: HttpClient,
}

impl HttpAnalysisBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self {
            config,
            http_client: HttpClient::new(),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ChannelError> {
        Ok(self.config.base_url.join(path)?)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        endpoint: &Url,
    ) -> Result<T, ChannelError> {
        Self::check_status(&response, endpoint)?;
        Ok(response.json().await?)
    }

    fn check_status(response: &Response, endpoint: &Url) -> Result<(), ChannelError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        error!("Backend request to {} failed: {}", endpoint, status);
        Err(ChannelError::Backend {
            status: status.as_u16(),
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn transcribe_segment(
        &self,
        interview_id: &SessionId,
        segment_number: u32,
        audio: Vec<u8>,
    ) -> Result<Transcription, ChannelError> {
        let endpoint = self.endpoint(&format!(
            "/api/analysis/transcribe/{}",
            urlencoding::encode(interview_id.as_str())
        ))?;

        debug!(
            "Uploading segment {} ({} bytes) to {}",
            segment_number,
            audio.len(),
            endpoint
        );

        let audio = Part::bytes(audio)
            .file_name("segment.wav")
            .mime_str("audio/wav")?;
        let form = Form::new()
            .part("audio", audio)
            .text("segmentNumber", segment_number.to_string());

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .multipart(form)
            .send()
            .await?;

        let body: TranscribeResponse = Self::read_json(response, &endpoint).await?;
        Ok(body.transcription)
    }

    async fn analyze(&self, interview_id: &SessionId) -> Result<AnalysisReport, ChannelError> {
        let endpoint = self.endpoint(&format!(
            "/api/analysis/analyze/{}",
            urlencoding::encode(interview_id.as_str())
        ))?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .send()
            .await?;

        Self::read_json(response, &endpoint).await
    }

    async fn detect_fraud(&self, frame: &str) -> Result<FraudCheck, ChannelError> {
        let endpoint = self.endpoint("/api/analysis/fraud-detection")?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .json(&serde_json::json!({ "frame": frame }))
            .send()
            .await?;

        Self::read_json(response, &endpoint).await
    }

    async fn interview_config(
        &self,
        interview_id: &SessionId,
    ) -> Result<InterviewConfig, ChannelError> {
        let endpoint = self.endpoint(&format!(
            "/api/interviews/{}/config",
            urlencoding::encode(interview_id.as_str())
        ))?;

        let response = self
            .authorize(self.http_client.get(endpoint.clone()))
            .send()
            .await?;

        Self::read_json(response, &endpoint).await
    }

    async fn generate_questions(
        &self,
        config: &InterviewConfig,
    ) -> Result<Vec<InterviewQuestion>, ChannelError> {
        let endpoint = self.endpoint("/api/questions/generate")?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .json(config)
            .send()
            .await?;

        let questions: Vec<InterviewQuestion> = Self::read_json(response, &endpoint).await?;
        debug!("Backend generated {} questions", questions.len());
        Ok(questions)
    }

    async fn analyze_response(
        &self,
        request: &ResponseAnalysisRequest,
    ) -> Result<Value, ChannelError> {
        let endpoint = self.endpoint("/api/analysis/response")?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .json(request)
            .send()
            .await?;

        Self::read_json(response, &endpoint).await
    }

    async fn complete_interview(
        &self,
        completion: &InterviewCompletion,
    ) -> Result<(), ChannelError> {
        let endpoint = self.endpoint("/api/interviews/complete")?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .json(completion)
            .send()
            .await?;

        // the reply body carries nothing the client needs
        Self::check_status(&response, &endpoint)
    }

    async fn generate_feedback(&self, request: &FeedbackRequest) -> Result<String, ChannelError> {
        let endpoint = self.endpoint("/api/feedback")?;

        let response = self
            .authorize(self.http_client.post(endpoint.clone()))
            .json(request)
            .send()
            .await?;

        let body: FeedbackResponse = Self::read_json(response, &endpoint).await?;
        Ok(body.summary)
    }
}
