//! Gemini provider against a local stand-in for the REST API.

use axum::Router;
use axum::extract::Path;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use flowdeck_core::{GenerateRequest, Message, Provider, ProviderError, StreamEvent};
use flowdeck_core::provider::EmbedRequest;
use flowdeck_providers::GeminiProvider;
use futures::StreamExt;
use serde_json::{Value, json};

async fn handle(
    Path(call): Path<String>,
    headers: HeaderMap,
    axum::Json(body): axum::Json<Value>,
) -> impl IntoResponse {
    if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) != Some("test-key") {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"error": {"code": 403, "message": "API key not valid"}})),
        )
            .into_response();
    }

    let (model, method) = call.split_once(':').unwrap_or((call.as_str(), ""));
    match (model, method) {
        ("missing-model", _) => (
            StatusCode::NOT_FOUND,
            axum::Json(json!({"error": {"code": 404, "message": "models/missing-model is not found"}})),
        )
            .into_response(),
        (_, "generateContent") => {
            let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap_or("");
            axum::Json(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": format!("echo: {prompt}")}]},
                    "finishReason": "STOP"
                }]
            }))
            .into_response()
        }
        ("unicode-model", "streamGenerateContent") => {
            let event = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"75°F\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n";
            let bytes = event.as_bytes();
            let split = bytes.iter().position(|b| *b == 0xC2).unwrap() + 1;
            let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            // Pause between parts so they arrive as separate reads.
            let stream = futures::stream::iter(parts).then(|part| async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                Ok::<_, std::io::Error>(part)
            });
            (
                [("content-type", "text/event-stream")],
                axum::body::Body::from_stream(stream),
            )
                .into_response()
        }
        (_, "streamGenerateContent") => {
            let sse = concat!(
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\r\n\r\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"lo\"}]},\"finishReason\":\"STOP\"}]}\r\n\r\n",
            );
            ([("content-type", "text/event-stream")], sse).into_response()
        }
        (_, "batchEmbedContents") => {
            let count = body["requests"].as_array().map_or(0, Vec::len);
            let embeddings: Vec<Value> = (0..count)
                .map(|i| json!({"values": [i as f32, 1.0]}))
                .collect();
            axum::Json(json!({ "embeddings": embeddings })).into_response()
        }
        (_, "predict") => axum::Json(json!({
            "predictions": [{"bytesBase64Encoded": "iVBORw0K", "mimeType": "image/png"}]
        }))
        .into_response(),
        _ => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn spawn_server() -> String {
    let app = Router::new().route("/v1beta/models/{call}", post(handle));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1beta")
}

async fn provider(key: &str) -> GeminiProvider {
    GeminiProvider::new(spawn_server().await, Some(key.to_string()), 10).unwrap()
}

#[tokio::test]
async fn generate_round_trip() {
    let provider = provider("test-key").await;
    let resp = provider
        .generate(GenerateRequest::new(
            "googleai/gemini-2.5-flash",
            vec![Message::user("ping")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.message.text(), "echo: ping");
}

#[tokio::test]
async fn stream_yields_chunks_then_done() {
    let provider = provider("test-key").await;
    let mut rx = provider
        .generate_stream(GenerateRequest::new("gemini-2.5-flash", vec![Message::user("hi")]))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    let mut done = None;
    while let Some(event) = rx.recv().await {
        match event.unwrap() {
            StreamEvent::Chunk(chunk) => chunks.push(chunk.text()),
            StreamEvent::Done(resp) => done = Some(resp),
        }
    }
    assert_eq!(chunks, vec!["Hel", "lo"]);
    assert_eq!(done.unwrap().message.text(), "Hello");
}

#[tokio::test]
async fn stream_keeps_multibyte_characters_split_across_reads() {
    let provider = provider("test-key").await;
    let mut rx = provider
        .generate_stream(GenerateRequest::new("unicode-model", vec![Message::user("temp?")]))
        .await
        .unwrap();

    let mut chunks = Vec::new();
    let mut done = None;
    while let Some(event) = rx.recv().await {
        match event.unwrap() {
            StreamEvent::Chunk(chunk) => chunks.push(chunk.text()),
            StreamEvent::Done(resp) => done = Some(resp),
        }
    }
    assert_eq!(chunks, vec!["75°F"]);
    assert_eq!(done.unwrap().message.text(), "75°F");
}

#[tokio::test]
async fn embeddings_one_per_input() {
    let provider = provider("test-key").await;
    let resp = provider
        .embed(EmbedRequest {
            model: "googleai/text-embedding-004".into(),
            inputs: vec!["a".into(), "b".into(), "c".into()],
        })
        .await
        .unwrap();
    assert_eq!(resp.embeddings.len(), 3);
    assert_eq!(resp.embeddings[2], vec![2.0, 1.0]);
}

#[tokio::test]
async fn imagen_returns_data_uri() {
    let provider = provider("test-key").await;
    let resp = provider
        .generate(GenerateRequest::new(
            "googleai/imagen-3.0-generate-002",
            vec![Message::user("a lighthouse at dusk")],
        ))
        .await
        .unwrap();
    assert_eq!(resp.message.media().unwrap().url, "data:image/png;base64,iVBORw0K");
}

#[tokio::test]
async fn status_codes_map_to_errors() {
    let bad_key = provider("wrong").await;
    let err = bad_key
        .generate(GenerateRequest::new("gemini-2.5-flash", vec![Message::user("x")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::AuthenticationFailed(msg) if msg == "API key not valid"));

    let provider = provider("test-key").await;
    let err = provider
        .generate(GenerateRequest::new("missing-model", vec![Message::user("x")]))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::ModelNotFound(_)));
}
