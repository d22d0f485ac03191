//! HTTP-level tests for the provider clients against a mock server.
//!
//! No test needs network access or real API keys.

use futures::StreamExt;
use glint_protocol::{ChatRequest, JsonSchema, StreamEvent, ToolDefinition};
use glint_providers::{
    AnthropicClient, OllamaClient, OpenAIClient, ProviderClient, ProviderConfig, ProviderError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn segment_tool() -> ToolDefinition {
    ToolDefinition::new(
        "create_segment",
        "Color one ball for a time range",
        JsonSchema::object()
            .property("ball", JsonSchema::integer())
            .property("start_time", JsonSchema::number())
            .property("end_time", JsonSchema::number())
            .property("color", JsonSchema::array(JsonSchema::integer()))
            .required(&["ball", "start_time", "end_time", "color"]),
    )
}

async fn collect(client: &dyn ProviderClient, request: &ChatRequest) -> Vec<StreamEvent> {
    client
        .send_streaming(request)
        .await
        .unwrap()
        .map(|item| item.unwrap())
        .collect()
        .await
}

fn split_stream(events: Vec<StreamEvent>) -> (Vec<String>, glint_protocol::NormalizedResponse) {
    let mut chunks = Vec::new();
    let mut complete = None;
    for event in events {
        match event {
            StreamEvent::Chunk(text) => {
                assert!(complete.is_none(), "chunk after completion");
                chunks.push(text);
            }
            StreamEvent::Complete(response) => complete = Some(response),
        }
    }
    (chunks, complete.expect("stream must end with a completion"))
}

#[tokio::test]
async fn openai_native_tool_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4o",
            "tools": [{"type": "function", "function": {"name": "create_segment"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "create_segment",
                            "arguments": "{\"ball\":0,\"start_time\":1.0,\"end_time\":2.0,\"color\":[255,0,0]}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 50, "completion_tokens": 20, "total_tokens": 70}
        })))
        .mount(&server)
        .await;

    let client =
        OpenAIClient::new(ProviderConfig::openai("sk-test").with_base_url(server.uri())).unwrap();
    let request = ChatRequest::new("make ball 1 red for a second").with_tools(vec![segment_tool()]);
    let response = client.send(&request).await.unwrap();

    let call = response.function_call().unwrap().parse().unwrap();
    assert_eq!(call.name, "create_segment");
    assert_eq!(call.arguments["color"], json!([255, 0, 0]));
    assert_eq!(response.finish_reason(), Some("function_call"));
    assert_eq!(response.total_tokens(), 70);
}

#[tokio::test]
async fn openai_streaming_reassembles_text() {
    let server = MockServer::start().await;

    let sse = [
        r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
        r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"The chorus "}}]}"#,
        r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"is now "}}]}"#,
        r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{"content":"blue."}}]}"#,
        r#"{"id":"c1","model":"gpt-4o","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        r#"{"id":"c1","model":"gpt-4o","choices":[],"usage":{"prompt_tokens":12,"completion_tokens":6,"total_tokens":18}}"#,
        "[DONE]",
    ]
    .iter()
    .map(|data| format!("data: {}\n\n", data))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .mount(&server)
        .await;

    let client =
        OpenAIClient::new(ProviderConfig::openai("sk-test").with_base_url(server.uri())).unwrap();
    let (chunks, response) = split_stream(collect(&client, &ChatRequest::new("blue chorus")).await);

    assert_eq!(chunks, vec!["The chorus ", "is now ", "blue."]);
    assert_eq!(
        glint_interpret::extract_text(&response),
        chunks.concat()
    );
    assert_eq!(response.id, "c1");
    assert_eq!(response.total_tokens(), 18);
    assert_eq!(response.finish_reason(), Some("stop"));
}

#[tokio::test]
async fn openai_auth_and_rate_limit_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer bad-key"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"type": "invalid_request_error", "message": "Incorrect API key provided"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer busy-key"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "7")
                .set_body_string("slow down"),
        )
        .mount(&server)
        .await;

    let request = ChatRequest::new("hi");

    let unauthorized =
        OpenAIClient::new(ProviderConfig::openai("bad-key").with_base_url(server.uri())).unwrap();
    let err = unauthorized.send(&request).await.unwrap_err();
    match err {
        ProviderError::AuthenticationFailed(message) => {
            assert!(message.contains("Incorrect API key"))
        }
        other => panic!("expected auth failure, got {:?}", other),
    }

    let limited =
        OpenAIClient::new(ProviderConfig::openai("busy-key").with_base_url(server.uri())).unwrap();
    let err = limited.send(&request).await.unwrap_err();
    assert_eq!(err.retry_after_ms(), Some(7000));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn anthropic_tool_use_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({"system": "Be brief"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "tool_use", "id": "toolu_1", "name": "create_segment",
                 "input": {"ball": 2, "start_time": 0, "end_time": 4, "color": [0, 0, 255]}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 100, "output_tokens": 25}
        })))
        .mount(&server)
        .await;

    let client =
        AnthropicClient::new(ProviderConfig::anthropic("ak-test").with_base_url(server.uri()))
            .unwrap();
    let request = ChatRequest::new("ball 3 blue")
        .with_system_message("Be brief")
        .with_tools(vec![segment_tool()]);
    let response = client.send(&request).await.unwrap();

    let call = response.function_call().unwrap().parse().unwrap();
    assert_eq!(call.name, "create_segment");
    assert_eq!(call.arguments["ball"], json!(2));
    assert_eq!(response.finish_reason(), Some("function_call"));
    assert_eq!(response.total_tokens(), 125);
}

#[tokio::test]
async fn anthropic_streaming_events() {
    let server = MockServer::start().await;

    let events = [
        ("message_start", r#"{"type":"message_start","message":{"id":"msg_2","model":"claude-sonnet-4-20250514","usage":{"input_tokens":30,"output_tokens":1}}}"#),
        ("content_block_start", r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#),
        ("ping", r#"{"type":"ping"}"#),
        ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Fading "}}"#),
        ("content_block_delta", r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"to white."}}"#),
        ("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
        ("message_delta", r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":9}}"#),
        ("message_stop", r#"{"type":"message_stop"}"#),
    ]
    .iter()
    .map(|(name, data)| format!("event: {}\ndata: {}\n\n", name, data))
    .collect::<String>();

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(events),
        )
        .mount(&server)
        .await;

    let client =
        AnthropicClient::new(ProviderConfig::anthropic("ak-test").with_base_url(server.uri()))
            .unwrap();
    let (chunks, response) = split_stream(collect(&client, &ChatRequest::new("fade")).await);

    assert_eq!(chunks, vec!["Fading ", "to white."]);
    assert_eq!(glint_interpret::extract_text(&response), "Fading to white.");
    assert_eq!(response.id, "msg_2");
    assert_eq!(response.finish_reason(), Some("stop"));
    assert_eq!(response.total_tokens(), 39);
}

#[tokio::test]
async fn anthropic_server_error_is_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "error",
            "error": {"type": "invalid_request_error", "message": "max_tokens too large"}
        })))
        .mount(&server)
        .await;

    let client =
        AnthropicClient::new(ProviderConfig::anthropic("ak-test").with_base_url(server.uri()))
            .unwrap();
    let err = client.send(&ChatRequest::new("x")).await.unwrap_err();
    match err {
        ProviderError::Status { status, message } => {
            assert_eq!(status, 400);
            assert!(message.contains("max_tokens too large"));
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn ollama_recovers_call_from_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "created_at": "2025-01-01T00:00:00Z",
            "message": {
                "role": "assistant",
                "content": "Sure!\ncreate_segment_for_word(word=\"hi\", color=\"red\")"
            },
            "done": true,
            "done_reason": "stop"
        })))
        .mount(&server)
        .await;

    let client =
        OllamaClient::new(ProviderConfig::ollama("llama3.1").with_base_url(server.uri())).unwrap();
    let response = client
        .send(&ChatRequest::new("say hi in red").with_tools(vec![segment_tool()]))
        .await
        .unwrap();

    let call = response.function_call().unwrap().parse().unwrap();
    assert_eq!(call.name, "create_segment_for_word");
    assert_eq!(call.arguments["word"], json!("hi"));
    assert_eq!(call.arguments["color"], json!("red"));
    assert_eq!(response.usage.map(|u| u.total_tokens), Some(0));
}

#[tokio::test]
async fn ollama_leaves_text_alone_without_tools() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1",
            "message": {"role": "assistant", "content": "clear_timeline(ball=1)"},
            "done": true
        })))
        .mount(&server)
        .await;

    let client =
        OllamaClient::new(ProviderConfig::ollama("llama3.1").with_base_url(server.uri())).unwrap();
    let response = client.send(&ChatRequest::new("clear ball 1")).await.unwrap();

    assert!(response.function_call().is_none());
    assert_eq!(glint_interpret::extract_text(&response), "clear_timeline(ball=1)");
}

#[tokio::test]
async fn ollama_streams_ndjson() {
    let server = MockServer::start().await;

    let body = [
        r#"{"model":"llama3.1","message":{"role":"assistant","content":"Ball 2 "},"done":false}"#,
        r#"{"model":"llama3.1","message":{"role":"assistant","content":"is green"},"done":false}"#,
        r#"{"model":"llama3.1","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","prompt_eval_count":14,"eval_count":4}"#,
    ]
    .join("\n");

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-ndjson")
                .set_body_string(body),
        )
        .mount(&server)
        .await;

    let client =
        OllamaClient::new(ProviderConfig::ollama("llama3.1").with_base_url(server.uri())).unwrap();
    let (chunks, response) = split_stream(collect(&client, &ChatRequest::new("green")).await);

    assert_eq!(chunks, vec!["Ball 2 ", "is green"]);
    assert_eq!(glint_interpret::extract_text(&response), "Ball 2 is green");
    assert_eq!(response.total_tokens(), 18);
    assert!(response.function_call().is_none());
}
