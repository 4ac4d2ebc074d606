//! End-to-end streaming tests against a mock chat-completions endpoint.

use flowchat::{
    BodyMode, ChatMessage, ChatProvider, CredentialService, HttpTransport, InMemorySecretStore,
    NormalizedEvent, ProviderOptions, RequestOptions, tool,
};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET_KEY: &str = "iflow.apiKey";

async fn credentials(key: &str) -> Arc<CredentialService> {
    let store = Arc::new(InMemorySecretStore::with_secret(SECRET_KEY, key));
    Arc::new(CredentialService::init(store, SECRET_KEY).await)
}

fn options_for(server: &MockServer) -> ProviderOptions {
    ProviderOptions::builder()
        .base_url(server.uri())
        .model("qwen3-max")
        .timeout(5)
        .build()
        .unwrap()
}

fn sse(frames: &[&str]) -> ResponseTemplate {
    let mut body = String::new();
    for frame in frames {
        body.push_str("data: ");
        body.push_str(frame);
        body.push_str("\n\n");
    }
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[tokio::test]
async fn test_text_stream_end_to_end() {
    // GIVEN: an endpoint streaming two content frames, a finish reason and the sentinel
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-e2e"))
        .respond_with(sse(&[
            r#"{"id":"1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hello"}}]}"#,
            r#"{"id":"1","choices":[{"index":0,"delta":{"content":", world"}}]}"#,
            r#"{"id":"1","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-e2e").await).unwrap();

    // WHEN: sending a request and draining the events
    let response = provider
        .send_chat_request(
            "iFlow/qwen3-max",
            "streaming_test",
            &[ChatMessage::user("hi")],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let events: Vec<_> = response
        .events
        .map(|e| e.unwrap())
        .collect()
        .await;

    // THEN: text deltas arrive in order followed by Done
    assert_eq!(
        events,
        vec![
            NormalizedEvent::TextDelta("Hello".to_string()),
            NormalizedEvent::TextDelta(", world".to_string()),
            NormalizedEvent::Done("stop".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_request_body_shape() {
    // GIVEN: an endpoint that only matches the expected request body
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "qwen3-max",
            "stream": true,
            "max_tokens": 32768,
            "messages": [{"role": "user", "content": "hi"}]
        })))
        .respond_with(sse(&["[DONE]"]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-body").await).unwrap();

    // WHEN: a single-text user message is sent with default options
    let response = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[ChatMessage::user("hi")],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await;

    // THEN: the body matched and the stream is empty
    let collected = response.unwrap().collect().await;
    assert!(collected.text.is_empty());
    assert!(collected.error.is_none());
}

#[tokio::test]
async fn test_tools_sent_with_auto_choice() {
    // GIVEN: a request carrying one tool
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "tool_choice": "auto",
            "tools": [{"type": "function", "function": {"name": "read_file"}}]
        })))
        .respond_with(sse(&["[DONE]"]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-tools").await).unwrap();
    let read_file = tool("read_file", "Read a file from the workspace")
        .param("target_file", "string")
        .build();

    // WHEN: sending with the tool attached
    let result = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[ChatMessage::user("open main.rs")],
            RequestOptions::new().with_tool(read_file),
            CancellationToken::new(),
        )
        .await;

    // THEN: the mock matched (verified on drop via expect(1))
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_tool_call_reassembly() {
    // GIVEN: one tool call whose arguments arrive in three fragments
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(&[
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_weather","arguments":""}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"city\":"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"Paris\"}"}}]}}]}"#,
            r#"{"choices":[{"index":0,"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-tc").await).unwrap();

    // WHEN: collecting the response
    let collected = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[ChatMessage::user("weather?")],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .collect()
        .await;

    // THEN: one complete call with decoded arguments
    assert_eq!(collected.tool_calls.len(), 1);
    let call = &collected.tool_calls[0];
    assert_eq!(call.id, "call_1");
    assert_eq!(call.name, "get_weather");
    assert_eq!(call.input, Some(json!({"city": "Paris"})));
    assert_eq!(collected.finish_reason.as_deref(), Some("tool_calls"));
}

#[tokio::test]
async fn test_malformed_frame_does_not_abort_stream() {
    // GIVEN: a corrupt frame between two good ones
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(&[
            r#"{"choices":[{"delta":{"content":"A"}}]}"#,
            r#"{"choices":[{"delta":{"content":"#,
            r#"{"choices":[{"delta":{"content":"B"}}]}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-bad").await).unwrap();

    // WHEN: collecting the response
    let collected = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[ChatMessage::user("x")],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .collect()
        .await;

    // THEN: both good frames survive
    assert_eq!(collected.text, "AB");
    assert!(collected.error.is_none());
}

#[tokio::test]
async fn test_pull_body_mode_matches_push() {
    // GIVEN: the same endpoint served through a pull-mode transport
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(sse(&[
            r#"{"choices":[{"delta":{"content":"pulled"}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]))
        .mount(&server)
        .await;

    let options = options_for(&server);
    let transport = HttpTransport::new(options.completions_url())
        .unwrap()
        .with_body_mode(BodyMode::Pull);
    let provider =
        ChatProvider::with_transport(options, credentials("sk-pull").await, Arc::new(transport));

    // WHEN: collecting the response
    let collected = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[ChatMessage::user("x")],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await
        .unwrap()
        .collect()
        .await;

    // THEN: the burst contains the same events a push body would
    assert_eq!(collected.text, "pulled");
    assert_eq!(collected.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn test_image_message_sent_as_data_uri() {
    // GIVEN: an endpoint expecting a text part and an image_url part
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "what is this?"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,iVA="}}
                ]
            }]
        })))
        .respond_with(sse(&["[DONE]"]))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ChatProvider::new(options_for(&server), credentials("sk-img").await).unwrap();
    let message = ChatMessage::user_with_image("what is this?", "image/png", vec![0x89u8, 0x50]);

    // WHEN: sending the image message
    let result = provider
        .send_chat_request(
            "",
            "streaming_test",
            &[message],
            RequestOptions::new(),
            CancellationToken::new(),
        )
        .await;

    // THEN: the mock matched
    assert!(result.is_ok());
}
