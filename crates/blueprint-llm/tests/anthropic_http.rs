//! Anthropic backend against a local stand-in server.

use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use blueprint_config::Config;
use blueprint_llm::{LlmError, LlmInvocation, Message, from_config};
use futures::StreamExt;
use serial_test::serial;

const KEY_ENV: &str = "BLUEPRINT_TEST_ANTHROPIC_KEY";

async fn messages(headers: HeaderMap, body: String) -> impl IntoResponse {
    if headers.get("x-api-key").and_then(|v| v.to_str().ok()) != Some("secret-key") {
        return (StatusCode::UNAUTHORIZED, String::new()).into_response();
    }
    let request: serde_json::Value = serde_json::from_str(&body).unwrap();
    if request["stream"] == true {
        let sse = concat!(
            "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"{\\\"opt\"}}\n\n",
            "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"ions\\\":[]}\"}}\n\n",
            "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
        );
        return ([("content-type", "text/event-stream")], sse).into_response();
    }
    let reply = serde_json::json!({
        "content": [{"type": "text", "text": format!("system={}", request["system"].as_str().unwrap_or(""))}],
        "usage": {"input_tokens": 3, "output_tokens": 5}
    });
    axum::Json(reply).into_response()
}

async fn spawn_server() -> String {
    let app = Router::new().route("/v1/messages", post(messages));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/v1/messages")
}

fn config(base_url: String) -> Config {
    let mut config = Config::builder().base_url(base_url).build().unwrap();
    config.llm.api_key_env = KEY_ENV.to_string();
    config
}

fn invocation() -> LlmInvocation {
    LlmInvocation::new(
        "proj",
        "techStack",
        Duration::from_secs(10),
        vec![Message::system("be terse"), Message::user("hi")],
    )
}

#[tokio::test]
#[serial]
async fn test_invoke_returns_text_and_usage() {
    let url = spawn_server().await;
    unsafe { std::env::set_var(KEY_ENV, "secret-key") };
    let backend = from_config(&config(url)).unwrap();

    let result = backend.invoke(invocation()).await.unwrap();

    assert_eq!(result.raw_response, "system=be terse");
    assert_eq!(result.tokens_output, Some(5));
    unsafe { std::env::remove_var(KEY_ENV) };
}

#[tokio::test]
#[serial]
async fn test_stream_yields_fragments_until_message_stop() {
    let url = spawn_server().await;
    unsafe { std::env::set_var(KEY_ENV, "secret-key") };
    let backend = from_config(&config(url)).unwrap();

    let fragments: Vec<String> = backend
        .stream(invocation())
        .await
        .unwrap()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(fragments, vec!["{\"opt".to_string(), "ions\":[]}".to_string()]);
    unsafe { std::env::remove_var(KEY_ENV) };
}

#[tokio::test]
#[serial]
async fn test_wrong_key_maps_to_auth_error() {
    let url = spawn_server().await;
    unsafe { std::env::set_var(KEY_ENV, "wrong") };
    let backend = from_config(&config(url)).unwrap();

    let err = backend.invoke(invocation()).await.unwrap_err();

    assert!(matches!(err, LlmError::ProviderAuth(_)));
    unsafe { std::env::remove_var(KEY_ENV) };
}
