use maxchat::client::MODEL;
use maxchat::error::CompletionError;
use maxchat::{ChatBackend, ChatMessage, ChatRequest, OpenAiClient, Role};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(max_tokens: Option<u32>) -> ChatRequest {
    ChatRequest {
        model: MODEL.to_string(),
        messages: vec![ChatMessage::new(Role::User, "\"four bars please\"")],
        temperature: 0.5,
        max_tokens,
    }
}

fn endpoint(server: &MockServer) -> String {
    format!("{}/v1/chat/completions", server.uri())
}

#[tokio::test]
async fn test_completion_returns_first_choice() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-3.5-turbo",
            "temperature": 0.5,
            "messages": [{"role": "user", "content": "\"four bars please\""}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "first", "refusal": null}},
                {"index": 1, "message": {"role": "assistant", "content": "second"}}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), Some("sk-test".to_string()));
    let reply = client.complete(&request(None)).await.unwrap();

    assert_eq!(reply.role(), Some("assistant"));
    assert_eq!(reply.content_text(), "first");
    assert_eq!(reply.as_value()["refusal"], Value::Null);
    assert!(reply.as_value().get("refusal").is_some());
}

#[tokio::test]
async fn test_unbounded_request_has_no_max_tokens() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "ok"}}]
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), Some("sk-test".to_string()));
    client.complete(&request(None)).await.unwrap();
    client.complete(&request(Some(64))).await.unwrap();

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 2);
    let unbounded: Value = received[0].body_json().unwrap();
    let capped: Value = received[1].body_json().unwrap();
    assert!(unbounded.get("max_tokens").is_none());
    assert_eq!(capped["max_tokens"], 64);
}

#[tokio::test]
async fn test_missing_key_sends_no_authorization() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "You didn't provide an API key.", "type": "invalid_request_error"}
        })))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), None);
    let err = client.complete(&request(None)).await.unwrap_err();

    let received = mock_server.received_requests().await.unwrap();
    assert!(received[0].headers.get("authorization").is_none());

    match err {
        CompletionError::Status { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body["error"]["type"], "invalid_request_error");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_json_error_body_is_kept_as_text() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), Some("sk-test".to_string()));
    let err = client.complete(&request(None)).await.unwrap_err();

    assert_eq!(
        err.detail_lines(),
        vec!["503".to_string(), "upstream unavailable".to_string()]
    );
}

#[tokio::test]
async fn test_empty_choices_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), Some("sk-test".to_string()));
    let err = client.complete(&request(None)).await.unwrap_err();
    assert!(matches!(err, CompletionError::NoChoices));
}

#[tokio::test]
async fn test_garbled_success_body_is_a_request_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = OpenAiClient::new(endpoint(&mock_server), Some("sk-test".to_string()));
    let err = client.complete(&request(None)).await.unwrap_err();
    assert!(matches!(err, CompletionError::Request(_)));
    assert_eq!(err.detail_lines().len(), 1);
}

/// Serves one request, answering 500 with a body shorter than its
/// Content-Length and then hanging up.
async fn truncated_error_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            received.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&received).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if received.len() >= end + 4 + length {
                    break;
                }
            }
        }
        stream
            .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Type: text/plain\r\nContent-Length: 100\r\n\r\npartial")
            .await
            .unwrap();
        stream.shutdown().await.ok();
    });

    format!("http://{addr}/v1/chat/completions")
}

#[tokio::test]
async fn test_unreadable_error_body_still_reports_status() {
    let endpoint = truncated_error_server().await;

    let client = OpenAiClient::new(endpoint, Some("sk-test".to_string()));
    let err = client.complete(&request(None)).await.unwrap_err();

    match err {
        CompletionError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, Value::String(String::new()));
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}
