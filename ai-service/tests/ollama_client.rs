//! Tests for the Ollama client against a local fake upstream.

use ai_service::config::OllamaConfig;
use ai_service::models::ChatMessage;
use ai_service::services::providers::ollama::OllamaTextProvider;
use ai_service::services::{IncrementalChunk, ProviderError, TextProvider};
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{stream, StreamExt};
use secrecy::Secret;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct Recorded {
    path: &'static str,
    auth: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct Upstream {
    requests: Arc<Mutex<Vec<Recorded>>>,
}

impl Upstream {
    fn record(&self, path: &'static str, headers: &HeaderMap, body: &Value) {
        let auth = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.requests.lock().unwrap().push(Recorded {
            path,
            auth,
            body: body.clone(),
        });
    }

    fn last(&self) -> Recorded {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

fn ndjson(pieces: Vec<&'static str>) -> Response {
    let body = Body::from_stream(stream::iter(pieces.into_iter().map(Ok::<_, Infallible>)));
    ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
}

fn failure(model: &str) -> Option<Response> {
    match model {
        "rate-limited" => Some(StatusCode::TOO_MANY_REQUESTS.into_response()),
        "broken" => Some((StatusCode::INTERNAL_SERVER_ERROR, "kaboom").into_response()),
        _ => None,
    }
}

async fn generate(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    upstream.record("/api/generate", &headers, &body);

    let model = body["model"].as_str().unwrap_or_default();
    if let Some(response) = failure(model) {
        return response;
    }

    if body["stream"] != json!(true) {
        return Json(json!({"response": "  hello  \n", "done": true})).into_response();
    }

    match model {
        "faulty" => ndjson(vec![
            "{\"response\":\"a\",\"done\":false}\n",
            "{\"error\":\"model crashed\"}\n",
        ]),
        _ => ndjson(vec![
            "{\"response\":\"Hel\",\"done\":false}\n{\"resp",
            "onse\":\"lo\",\"done\":false}\n\n",
            "{\"response\":\"\",\"done\":true}\n",
            "{\"response\":\"ignored\",\"done\":false}\n",
        ]),
    }
}

async fn chat(
    State(upstream): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    upstream.record("/api/chat", &headers, &body);

    if let Some(response) = failure(body["model"].as_str().unwrap_or_default()) {
        return response;
    }

    if body["stream"] != json!(true) {
        return Json(json!({
            "message": {"role": "assistant", "content": " hey there "},
            "done": true
        }))
        .into_response();
    }

    ndjson(vec![
        "{\"message\":{\"role\":\"assistant\",\"content\":\"he\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"y\"},\"done\":true}",
    ])
}

async fn tags(headers: HeaderMap) -> StatusCode {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer test-key") => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

async fn spawn_upstream() -> (String, Upstream) {
    let upstream = Upstream::default();
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/api/chat", post(chat))
        .route("/api/tags", get(tags))
        .with_state(upstream.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), upstream)
}

fn provider(host: &str, api_key: &str) -> OllamaTextProvider {
    OllamaTextProvider::new(OllamaConfig {
        host: host.to_string(),
        api_key: Secret::new(api_key.to_string()),
        model: "default-model".to_string(),
    })
    .unwrap()
}

fn user(content: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::new("user", content)]
}

#[tokio::test]
async fn generate_sends_default_model_and_trims_reply() {
    let (host, upstream) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let reply = client.generate("hi", None).await.unwrap();

    assert_eq!(reply, "hello");
    let request = upstream.last();
    assert_eq!(request.path, "/api/generate");
    assert_eq!(request.auth.as_deref(), Some("Bearer test-key"));
    assert_eq!(
        request.body,
        json!({"model": "default-model", "prompt": "hi", "stream": false})
    );
}

#[tokio::test]
async fn model_override_is_trimmed_and_blank_falls_back() {
    let (host, upstream) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    client.generate("hi", Some(" llama3 ")).await.unwrap();
    assert_eq!(upstream.last().body["model"], "llama3");

    client.generate("hi", Some("  ")).await.unwrap();
    assert_eq!(upstream.last().body["model"], "default-model");
}

#[tokio::test]
async fn chat_forwards_messages_and_trims_reply() {
    let (host, upstream) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let reply = client.chat(&user("hello"), None).await.unwrap();

    assert_eq!(reply, "hey there");
    let request = upstream.last();
    assert_eq!(request.path, "/api/chat");
    assert_eq!(
        request.body,
        json!({
            "model": "default-model",
            "messages": [{"role": "user", "content": "hello"}],
            "stream": false
        })
    );
}

#[tokio::test]
async fn status_429_is_rate_limited() {
    let (host, _) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let err = client.generate("hi", Some("rate-limited")).await.unwrap_err();
    assert_eq!(err, ProviderError::RateLimited);

    let err = client
        .generate_stream("hi", Some("rate-limited"))
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::RateLimited);
}

#[tokio::test]
async fn other_error_status_carries_body() {
    let (host, _) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let err = client.chat(&user("x"), Some("broken")).await.unwrap_err();

    assert_eq!(
        err,
        ProviderError::ApiError("Ollama API error 500 Internal Server Error: kaboom".to_string())
    );
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let client = provider("http://127.0.0.1:1", "test-key");

    let err = client.generate("hi", None).await.unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)));
}

#[tokio::test]
async fn generate_stream_reassembles_lines_and_stops_at_done() {
    let (host, upstream) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let chunks: Vec<_> = client
        .generate_stream("hi", None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            Ok(IncrementalChunk::text("Hel")),
            Ok(IncrementalChunk::text("lo")),
            Ok(IncrementalChunk::finished()),
        ]
    );
    assert_eq!(upstream.last().body["stream"], true);
}

#[tokio::test]
async fn stream_error_line_is_a_fault() {
    let (host, _) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let chunks: Vec<_> = client
        .generate_stream("hi", Some("faulty"))
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            Ok(IncrementalChunk::text("a")),
            Err(ProviderError::ApiError("model crashed".to_string())),
        ]
    );
}

#[tokio::test]
async fn chat_stream_reads_message_content_and_unterminated_tail() {
    let (host, _) = spawn_upstream().await;
    let client = provider(&host, "test-key");

    let chunks: Vec<_> = client
        .chat_stream(&user("hi"), None)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(
        chunks,
        vec![
            Ok(IncrementalChunk::text("he")),
            Ok(IncrementalChunk {
                text: Some("y".to_string()),
                is_final: true
            }),
        ]
    );
}

#[tokio::test]
async fn health_check_uses_api_key() {
    let (host, _) = spawn_upstream().await;

    assert!(provider(&host, "test-key").health_check().await.is_ok());
    assert!(matches!(
        provider(&host, "wrong-key").health_check().await,
        Err(ProviderError::ApiError(_))
    ));
}
