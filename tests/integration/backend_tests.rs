//! Backend adapter integration tests against mocked provider APIs

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use trio_relay::backend::registry::create_adapter;
use trio_relay::backend::{AlternationFallback, AnthropicBackend, BackendAdapter, OpenAiBackend};
use trio_relay::config::BackendConfig;
use trio_relay::error::ProviderErrorKind;
use trio_relay::relay::{BackendId, LabeledMessage, ProviderRole, RetryPolicy};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn openai_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        endpoint: format!("{}/v1", server.uri()),
        api_key_env: None,
        api_key: Some("sk-test".to_string()),
        ..BackendConfig::openai_default()
    }
}

fn anthropic_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        endpoint: format!("{}/v1/", server.uri()),
        api_key_env: None,
        api_key: Some("ant-test".to_string()),
        ..BackendConfig::anthropic_default()
    }
}

fn labeled(role: ProviderRole, content: &str) -> LabeledMessage {
    LabeledMessage {
        role,
        content: content.to_string(),
    }
}

/// A context Anthropic rejects faithfully: two assistant turns in a row
fn three_way_context() -> Vec<LabeledMessage> {
    vec![
        LabeledMessage::system("Three speakers share this chat."),
        labeled(ProviderRole::User, "[SPEAKER: USER] hello both"),
        labeled(ProviderRole::Assistant, "[SPEAKER: GPT] hi from gpt"),
    ]
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|req| serde_json::from_slice(&req.body).unwrap())
        .collect()
}

fn anthropic_text(text: &str) -> Value {
    json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": text }]
    })
}

#[tokio::test]
async fn test_openai_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "world" },
                "finish_reason": "stop"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(BackendId::Gpt, &openai_config(&server)).unwrap();
    let reply = backend
        .call(&[labeled(ProviderRole::User, "[SPEAKER: USER] hello")], Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(reply, "world");
    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["model"], "gpt-4");
    assert_eq!(bodies[0]["messages"][0]["content"], "[SPEAKER: USER] hello");
}

#[tokio::test]
async fn test_openai_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(BackendId::Gpt, &openai_config(&server)).unwrap();
    let err = backend
        .call(&[labeled(ProviderRole::User, "[SPEAKER: USER] hi")], Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.backend, BackendId::Gpt);
    assert_eq!(
        err.kind,
        ProviderErrorKind::Status {
            status: 500,
            body: "upstream exploded".to_string()
        }
    );
}

#[tokio::test]
async fn test_openai_empty_choices_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(BackendId::Gpt, &openai_config(&server)).unwrap();
    let err = backend.call(&[], Duration::from_secs(5)).await.unwrap_err();

    assert!(matches!(err.kind, ProviderErrorKind::Malformed(_)));
}

#[tokio::test]
async fn test_openai_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new(BackendId::Gpt, &openai_config(&server)).unwrap();
    let err = backend
        .call(&[labeled(ProviderRole::User, "[SPEAKER: USER] hi")], Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}

#[tokio::test]
async fn test_anthropic_faithful_sends_system_field_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_text("hello from claude")))
        .expect(1)
        .mount(&server)
        .await;

    let inner = Arc::new(AnthropicBackend::new(BackendId::Claude, &anthropic_config(&server)).unwrap());
    let adapter = AlternationFallback::new(inner);
    let context = vec![
        LabeledMessage::system("Three speakers share this chat."),
        labeled(ProviderRole::User, "[SPEAKER: USER] hello"),
    ];

    let reply = adapter.call(&context, Duration::from_secs(5)).await.unwrap();

    assert_eq!(reply, "hello from claude");
    let bodies = request_bodies(&server).await;
    assert_eq!(bodies[0]["system"], "Three speakers share this chat.");
    assert_eq!(bodies[0]["max_tokens"], 1000);
    assert_eq!(bodies[0]["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_anthropic_alternation_rejection_retries_with_compat_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": {
                "type": "invalid_request_error",
                "message": "messages: roles must alternate between \"user\" and \"assistant\""
            }
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(anthropic_text("compat reply")))
        .mount(&server)
        .await;

    let inner = Arc::new(AnthropicBackend::new(BackendId::Claude, &anthropic_config(&server)).unwrap());
    let reply = AlternationFallback::new(inner)
        .call(&three_way_context(), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(reply, "compat reply");

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["system"], "Three speakers share this chat.");
    assert_eq!(bodies[0]["messages"][1]["role"], "assistant");
    assert!(bodies[1].get("system").is_none());
    assert_eq!(bodies[1]["messages"][0]["role"], "user");
    assert_eq!(bodies[1]["messages"][1]["role"], "user");
    assert_eq!(bodies[1]["messages"][1]["content"], "[SPEAKER: GPT] hi from gpt");
}

#[tokio::test]
async fn test_anthropic_unrelated_error_skips_compat() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let inner = Arc::new(AnthropicBackend::new(BackendId::Claude, &anthropic_config(&server)).unwrap());
    let err = AlternationFallback::new(inner)
        .call(&three_way_context(), Duration::from_secs(5))
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "backend returned 401: invalid x-api-key");
    assert_eq!(request_bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn test_retry_around_registered_adapter_formats_final_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(3)
        .mount(&server)
        .await;

    let adapter = create_adapter(BackendId::Claude, &anthropic_config(&server)).unwrap();
    let policy = RetryPolicy {
        backoff_base: Duration::ZERO,
        ..RetryPolicy::default()
    };
    let context = three_way_context();

    let failure = policy
        .attempt(BackendId::Claude, |timeout| adapter.call(&context, timeout))
        .await
        .unwrap_err();

    assert_eq!(failure.attempts, 3);
    assert_eq!(
        failure.to_string(),
        "(error from Claude: backend returned 503: overloaded)"
    );
}
