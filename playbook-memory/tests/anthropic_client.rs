//! Anthropic client against a mock Messages endpoint

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use playbook_memory::{AnthropicClient, Error, ExtractorConfig, LlmClient, LlmRequest};

fn config(base_url: &str) -> ExtractorConfig {
    ExtractorConfig {
        api_key: Some("sk-test".to_string()),
        model: "claude-test".to_string(),
        base_url: base_url.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_complete_returns_text_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-test",
            "max_tokens": 8192 + 2048,
            "thinking": {"type": "enabled", "budget_tokens": 2048},
            "system": [{"type": "text", "text": "playbook", "cache_control": {"type": "ephemeral"}}],
            "messages": [{"role": "user", "content": "reflect"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "```json\n{\"new_key_points\": []}\n```"}
            ],
            "usage": {"input_tokens": 120, "output_tokens": 40, "cache_read_input_tokens": 100}
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Trailing slash on the base URL is tolerated
    let client = AnthropicClient::new(&config(&format!("{}/", server.uri()))).unwrap();
    assert_eq!(client.endpoint(), format!("{}/v1/messages", server.uri()));

    let request = LlmRequest::new("reflect")
        .with_system(Some("playbook".to_string()))
        .with_thinking_budget(2048);
    let reply = client.complete(&request).await.unwrap();
    assert_eq!(reply, "```json\n{\"new_key_points\": []}\n```");
}

#[tokio::test]
async fn test_plain_request_omits_optional_blocks() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "ok"}]
        })))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server.uri())).unwrap();
    let reply = client
        .complete(&LlmRequest::new("hi").with_thinking_budget(0))
        .await
        .unwrap();
    assert_eq!(reply, "ok");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert!(body.get("system").is_none());
    assert!(body.get("thinking").is_none());
    assert_eq!(body["max_tokens"], 8192);
}

#[tokio::test]
async fn test_error_status_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let client = AnthropicClient::new(&config(&server.uri())).unwrap();
    let err = client.complete(&LlmRequest::new("reflect")).await.unwrap_err();
    match err {
        Error::Api { status, body } => {
            assert_eq!(status, 529);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected API error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_endpoint_is_http_error() {
    let client = AnthropicClient::new(&config("http://127.0.0.1:1")).unwrap();
    let err = client.complete(&LlmRequest::new("reflect")).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
}

#[test]
fn test_missing_key_is_config_error() {
    let config = ExtractorConfig::default();
    assert!(matches!(AnthropicClient::new(&config), Err(Error::Config(_))));
}
