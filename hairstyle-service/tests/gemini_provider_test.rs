//! Exercises the Gemini provider against an in-process fake of the REST API.

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    Json, Router,
};
use hairstyle_service::config::HairstyleConfig;
use hairstyle_service::services::providers::gemini::{GeminiConfig, GeminiVisionProvider};
use hairstyle_service::services::providers::{
    FinishReason, GenerationParams, InlineImage, ProviderError, VisionProvider,
};
use hairstyle_service::startup::Application;
use reqwest::multipart;
use secrecy::Secret;
use service_core::retry::RecordingSleeper;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeGemini {
    status: StatusCode,
    reply: Value,
    seen: Arc<Mutex<Vec<(Uri, Value)>>>,
}

async fn fake_generate(
    State(fake): State<FakeGemini>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    fake.seen.lock().unwrap().push((uri, body));
    (fake.status, Json(fake.reply.clone()))
}

/// Start a fake Gemini endpoint and return its base URL plus the request log.
async fn spawn_fake(status: StatusCode, reply: Value) -> (String, Arc<Mutex<Vec<(Uri, Value)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeGemini {
        status,
        reply,
        seen: seen.clone(),
    };

    let router = Router::new().fallback(fake_generate).with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    (format!("http://127.0.0.1:{}/v1beta", port), seen)
}

fn provider(api_base: String) -> GeminiVisionProvider {
    GeminiVisionProvider::new(GeminiConfig {
        api_key: Secret::new("test-key".to_string()),
        model: "gemini-1.5-flash".to_string(),
        api_base,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

fn image() -> InlineImage {
    InlineImage {
        data: "ZmFrZS1qcGVn".to_string(),
        mime_type: "image/jpeg".to_string(),
    }
}

fn params() -> GenerationParams {
    GenerationParams {
        temperature: Some(0.7),
        top_k: Some(40),
        top_p: Some(0.95),
        max_output_tokens: Some(1024),
    }
}

#[tokio::test]
async fn generate_sends_prompt_image_and_config() {
    let reply = json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": "{\"currentHairstyle\":" }, { "text": "\"Bob\"}" }] },
            "finishReason": "STOP"
        }],
        "usageMetadata": { "promptTokenCount": 300, "candidatesTokenCount": 12 }
    });
    let (base, seen) = spawn_fake(StatusCode::OK, reply).await;

    let response = provider(base)
        .generate("Describe the hairstyle", &image(), &params())
        .await
        .unwrap();

    assert_eq!(response.text, "{\"currentHairstyle\":\"Bob\"}");
    assert_eq!(response.input_tokens, 300);
    assert_eq!(response.output_tokens, 12);
    assert_eq!(response.finish_reason, FinishReason::Complete);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (uri, body) = &seen[0];
    assert_eq!(uri.path(), "/v1beta/models/gemini-1.5-flash:generateContent");
    assert_eq!(uri.query(), Some("key=test-key"));

    let parts = &body["contents"][0]["parts"];
    assert_eq!(parts[0]["text"], "Describe the hairstyle");
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
    assert_eq!(parts[1]["inlineData"]["data"], "ZmFrZS1qcGVn");
    assert_eq!(body["generationConfig"]["topK"], 40);
    assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let reply = json!({ "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" } });
    let (base, _) = spawn_fake(StatusCode::TOO_MANY_REQUESTS, reply).await;

    let err = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::RateLimited("Resource has been exhausted".to_string())
    );
    assert_eq!(err.status_code(), Some(429));
}

#[tokio::test]
async fn status_403_is_api_error() {
    let reply = json!({ "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" } });
    let (base, _) = spawn_fake(StatusCode::FORBIDDEN, reply).await;

    let err = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ProviderError::ApiError {
            status: 403,
            message: "API key not valid".to_string()
        }
    );
}

#[tokio::test]
async fn blocked_prompt_is_content_filtered() {
    let reply = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
    let (base, _) = spawn_fake(StatusCode::OK, reply).await;

    let err = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap_err();

    assert_eq!(err, ProviderError::ContentFiltered);
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn missing_candidates_is_empty_response() {
    let (base, _) = spawn_fake(StatusCode::OK, json!({ "candidates": [] })).await;

    let err = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::EmptyResponse(_)));
}

fn blank_reply() -> Value {
    json!({
        "candidates": [{
            "content": { "parts": [{ "text": "" }] },
            "finishReason": "STOP"
        }]
    })
}

#[tokio::test]
async fn candidate_without_text_is_passed_through() {
    let (base, _) = spawn_fake(StatusCode::OK, blank_reply()).await;

    let response = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap();

    assert_eq!(response.text, "");
    assert_eq!(response.finish_reason, FinishReason::Complete);
}

#[tokio::test]
async fn truncated_reply_reports_length_finish() {
    let reply = json!({
        "candidates": [{
            "content": { "parts": [{ "text": "{\"currentHairstyle\": \"Bo" }] },
            "finishReason": "MAX_TOKENS"
        }]
    });
    let (base, _) = spawn_fake(StatusCode::OK, reply).await;

    let response = provider(base)
        .generate("prompt", &image(), &params())
        .await
        .unwrap();

    assert_eq!(response.finish_reason, FinishReason::Length);
    assert_eq!(response.text, "{\"currentHairstyle\": \"Bo");
}

#[tokio::test]
async fn blank_model_reply_degrades_to_placeholder_analysis() {
    let (base, seen) = spawn_fake(StatusCode::OK, blank_reply()).await;
    let scratch = tempfile::tempdir().unwrap();

    let mut config = HairstyleConfig::default();
    config.common.host = "127.0.0.1".to_string();
    config.common.port = 0;
    config.upload.scratch_dir = scratch.path().to_path_buf();

    let app = Application::build_with_provider(
        config,
        Arc::new(provider(base)),
        Arc::new(RecordingSleeper::new()),
    )
    .await
    .unwrap();
    let port = app.port();
    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(b"fake-jpeg".to_vec())
            .file_name("portrait.jpg")
            .mime_str("image/jpeg")
            .unwrap(),
    );
    let response = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/api/detect-hairstyle", port))
        .multipart(form)
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["rawResponse"], "");
    assert_eq!(body["analysis"]["currentHairstyle"], "Could not determine");
    assert_eq!(
        body["analysis"]["description"],
        "The model returned no analysis text."
    );
    assert_eq!(
        body["analysis"]["suggestions"][0]["name"],
        "Consult with response"
    );
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_endpoint_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = provider(format!("http://127.0.0.1:{}/v1beta", port))
        .generate("prompt", &image(), &params())
        .await
        .unwrap_err();

    match err {
        ProviderError::NetworkError(message) => assert!(!message.contains("test-key")),
        other => panic!("unexpected error: {other:?}"),
    }
}
