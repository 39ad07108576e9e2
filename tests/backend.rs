use interview_channel::ports::{
    AnalysisBackend, FeedbackRequest, FraudCheck, FraudEvent, InterviewCompletion,
    InterviewConfig, ResponseAnalysisRequest,
};
use interview_channel::{BackendConfig, ChannelError, HttpAnalysisBackend, SessionId};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serve one HTTP response and hand back the raw request
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;

        let response = format!(
            "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.unwrap();

        request
    });

    (base_url, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = socket.read(&mut chunk).await.unwrap();
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let text = String::from_utf8_lossy(&buffer).to_string();
        let Some(header_end) = text.find("\r\n\r\n") else {
            continue;
        };
        let headers = text[..header_end].to_ascii_lowercase();
        let body_len = buffer.len() - (header_end + 4);

        let content_length = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .map(|value| value.trim().parse::<usize>().unwrap());

        match content_length {
            Some(expected) if body_len >= expected => break,
            Some(_) => continue,
            None if headers.contains("transfer-encoding: chunked") => {
                if text.ends_with("0\r\n\r\n") {
                    break;
                }
            }
            None => break,
        }
    }

    String::from_utf8_lossy(&buffer).to_string()
}

#[tokio::test]
async fn test_transcribe_segment_uploads_multipart() {
    let (base_url, server) = serve_once(200, r#"{"transcription":{"text":"hello world"}}"#).await;
    let backend = HttpAnalysisBackend::new(
        BackendConfig::from_url(&base_url)
            .unwrap()
            .with_auth_token("token-1"),
    );

    let transcription = backend
        .transcribe_segment(&SessionId::new("room 7"), 3, b"RIFF....WAVE".to_vec())
        .await
        .unwrap();
    assert_eq!(transcription.text, "hello world");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/analysis/transcribe/room%207 HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer token-1"));
    assert!(request.contains("name=\"segmentNumber\""));
    assert!(request.contains("name=\"audio\"; filename=\"segment.wav\""));
    assert!(request.contains("RIFF....WAVE"));
}

#[tokio::test]
async fn test_analyze_returns_report() {
    let (base_url, server) = serve_once(
        200,
        r#"{"technicalScore":0.8,"communicationScore":0.7,"engagementScore":0.6,"keyInsights":["Good pacing"],"segments":[]}"#,
    )
    .await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let report = backend.analyze(&SessionId::new("abc123")).await.unwrap();
    assert_eq!(report.scores.communication_score, 0.7);
    assert_eq!(report.key_insights, vec!["Good pacing".to_string()]);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/analysis/analyze/abc123 HTTP/1.1"));
    assert!(!request.to_ascii_lowercase().contains("authorization:"));
}

#[tokio::test]
async fn test_detect_fraud_posts_frame() {
    let (base_url, server) = serve_once(
        200,
        r#"{"fraudDetected":true,"type":"face_not_visible","confidence":0.81}"#,
    )
    .await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let check = backend
        .detect_fraud("data:image/jpeg;base64,AAAA")
        .await
        .unwrap();
    assert!(check.fraud_detected);
    assert_eq!(check.kind.as_deref(), Some("face_not_visible"));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/analysis/fraud-detection HTTP/1.1"));
    assert!(request.contains(r#"{"frame":"data:image/jpeg;base64,AAAA"}"#));
}

#[tokio::test]
async fn test_error_status_maps_to_backend_error() {
    let (base_url, server) = serve_once(503, r#"{"error":"busy"}"#).await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let result = backend.analyze(&SessionId::new("abc123")).await;
    match result {
        Err(ChannelError::Backend { status, endpoint }) => {
            assert_eq!(status, 503);
            assert!(endpoint.ends_with("/api/analysis/analyze/abc123"));
        }
        other => panic!("expected backend error, got {:?}", other.map(|_| ())),
    }

    server.await.unwrap();
}

/// JSON body of a raw request
fn json_body(request: &str) -> Value {
    let (_, body) = request.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn test_interview_config_fills_defaults() {
    let (base_url, server) = serve_once(200, r#"{"type":"behavioral","duration":30}"#).await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let config = backend
        .interview_config(&SessionId::new("abc123"))
        .await
        .unwrap();
    assert_eq!(config.kind, "behavioral");
    assert_eq!(config.duration, 30);
    assert_eq!(config.level, "senior");
    assert_eq!(config.question_count, 5);

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /api/interviews/abc123/config HTTP/1.1"));
}

#[tokio::test]
async fn test_generate_questions_posts_config() {
    let (base_url, server) = serve_once(
        200,
        r#"[{"id":"q1","text":"Explain ownership","difficulty":"hard"},{"id":"q2","text":"Describe a conflict"}]"#,
    )
    .await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let questions = backend
        .generate_questions(&InterviewConfig::default())
        .await
        .unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0].id, "q1");
    assert_eq!(questions[0].extra.get("difficulty"), Some(&json!("hard")));
    assert_eq!(questions[1].text, "Describe a conflict");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/questions/generate HTTP/1.1"));
    assert_eq!(
        json_body(&request),
        json!({"type": "technical", "level": "senior", "duration": 45, "questionCount": 5})
    );
}

#[tokio::test]
async fn test_analyze_response_sends_question_context() {
    let (base_url, server) = serve_once(200, r#"{"score":4,"notes":"solid"}"#).await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let analysis = backend
        .analyze_response(&ResponseAnalysisRequest {
            transcript: "I would use a mutex".to_string(),
            question_id: "q1".to_string(),
            interview_type: "technical".to_string(),
            level: "mid".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(analysis["score"], json!(4));

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/analysis/response HTTP/1.1"));
    assert_eq!(
        json_body(&request),
        json!({
            "transcript": "I would use a mutex",
            "questionId": "q1",
            "interviewType": "technical",
            "level": "mid"
        })
    );
}

#[tokio::test]
async fn test_complete_interview_posts_fraud_events() {
    let (base_url, server) = serve_once(200, r#"{"ok":true}"#).await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let flagged = FraudCheck {
        fraud_detected: true,
        kind: Some("face_not_visible".to_string()),
        confidence: Some(0.7),
    };
    let completion = InterviewCompletion {
        questions: vec![json!({"id": "q1", "text": "Explain ownership", "analysis": {"score": 4}})],
        fraud_detection_events: FraudEvent::from_check(&flagged, "2024-05-01T10:00:00Z")
            .into_iter()
            .collect(),
        duration: 45,
        completed_at: "2024-05-01T10:45:00Z".to_string(),
    };

    backend.complete_interview(&completion).await.unwrap();

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/interviews/complete HTTP/1.1"));
    let body = json_body(&request);
    assert_eq!(body["duration"], json!(45));
    assert_eq!(body["completedAt"], json!("2024-05-01T10:45:00Z"));
    assert_eq!(
        body["fraudDetectionEvents"],
        json!([{"timestamp": "2024-05-01T10:00:00Z", "type": "face_not_visible", "confidence": 0.7}])
    );
    assert_eq!(body["questions"][0]["analysis"]["score"], json!(4));
}

#[tokio::test]
async fn test_complete_interview_rejected() {
    let (base_url, server) = serve_once(500, r#"{"error":"db down"}"#).await;
    let backend = HttpAnalysisBackend::new(BackendConfig::from_url(&base_url).unwrap());

    let completion = InterviewCompletion {
        questions: Vec::new(),
        fraud_detection_events: Vec::new(),
        duration: 45,
        completed_at: "2024-05-01T10:45:00Z".to_string(),
    };
    let result = backend.complete_interview(&completion).await;
    assert!(matches!(result, Err(ChannelError::Backend { status: 500, .. })));

    server.await.unwrap();
}

#[tokio::test]
async fn test_generate_feedback_returns_summary() {
    let (base_url, server) = serve_once(200, r#"{"summary":"Strong systems knowledge."}"#).await;
    let backend = HttpAnalysisBackend::new(
        BackendConfig::from_url(&base_url)
            .unwrap()
            .with_auth_token("id-token"),
    );

    let summary = backend
        .generate_feedback(&FeedbackRequest {
            interview_id: SessionId::new("abc123"),
            technical_skills: 4,
            communication_skills: 5,
            notes: "Explained lifetimes clearly and asked good questions.".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(summary, "Strong systems knowledge.");

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /api/feedback HTTP/1.1"));
    assert!(request.to_ascii_lowercase().contains("authorization: bearer id-token"));
    assert_eq!(
        json_body(&request),
        json!({
            "interviewId": "abc123",
            "technicalSkills": 4,
            "communicationSkills": 5,
            "notes": "Explained lifetimes clearly and asked good questions."
        })
    );
}
