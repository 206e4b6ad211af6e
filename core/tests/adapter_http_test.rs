//! Adapters against a local one-shot HTTP server with canned bodies

use colloquy_core::llm::{
    collect_final, AnthropicAdapter, GeminiAdapter, OllamaAdapter, OpenAiAdapter,
};
use colloquy_core::{
    ChatRequest, Conversation, ProviderAdapter, ProviderConfig, ProviderResponse, ProviderStream,
};
use futures::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve one response, then hand back the request head that was received
async fn serve_once(
    status: &'static str,
    content_type: &'static str,
    body: &str,
) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let body = body.to_string();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let head = read_request(&mut socket).await;
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();
        head
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_string();
            let body_len = head
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + body_len {
                return head;
            }
        }
    }
    String::from_utf8_lossy(&buf).to_string()
}

fn config(base_url: String, model: &str) -> ProviderConfig {
    ProviderConfig {
        base_url,
        model: model.into(),
        api_key: Some("test-key".into()),
        request_timeout_ms: 5_000,
        temperature: None,
        max_tokens: None,
    }
}

fn streaming_request() -> ChatRequest {
    ChatRequest::new(Conversation::from_prompt("Be brief.", "hi")).streaming(true)
}

fn plain_request() -> ChatRequest {
    ChatRequest::new(Conversation::from_prompt("Be brief.", "hi"))
}

async fn texts(stream: ProviderStream) -> Vec<String> {
    stream
        .map(|item| item.unwrap().text().unwrap_or_default().to_string())
        .collect()
        .await
}

#[tokio::test]
async fn openai_sse_becomes_cumulative_chunks() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"H\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"e\"}}]}\n\n",
        "data: [DONE]\n\n",
    );
    let (base, server) = serve_once("200 OK", "text/event-stream", body).await;
    let adapter = OpenAiAdapter::new(config(base, "gpt-4o-mini")).unwrap();

    let stream = adapter.send(streaming_request()).await.unwrap();
    assert_eq!(texts(stream).await, vec!["H", "He"]);

    let head = server.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("post /chat/completions"));
    assert!(head.contains("authorization: bearer test-key"));
}

#[tokio::test]
async fn anthropic_sse_becomes_cumulative_chunks() {
    let body = concat!(
        "event: message_start\ndata: {\"type\":\"message_start\"}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"H\"}}\n\n",
        "event: ping\ndata: {\"type\":\"ping\"}\n\n",
        "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"i\"}}\n\n",
        "event: message_stop\ndata: {\"type\":\"message_stop\"}\n\n",
    );
    let (base, server) = serve_once("200 OK", "text/event-stream", body).await;
    let adapter = AnthropicAdapter::new(config(base, "claude-3-haiku-20240307")).unwrap();

    let stream = adapter.send(streaming_request()).await.unwrap();
    assert_eq!(texts(stream).await, vec!["H", "Hi"]);

    let head = server.await.unwrap().to_ascii_lowercase();
    assert!(head.starts_with("post /messages"));
    assert!(head.contains("x-api-key: test-key"));
    assert!(head.contains("anthropic-version: 2023-06-01"));
}

#[tokio::test]
async fn gemini_deltas_are_folded_into_cumulative_text() {
    let body = concat!(
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"Hel\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"role\":\"model\",\"parts\":[{\"text\":\"lo\"}]}}]}\n\n",
        "data: {\"usageMetadata\":{\"totalTokenCount\":3}}\n\n",
    );
    let (base, server) = serve_once("200 OK", "text/event-stream", body).await;
    let adapter = GeminiAdapter::new(config(base, "gemini-1.5-flash")).unwrap();

    let stream = adapter.send(streaming_request()).await.unwrap();
    assert_eq!(texts(stream).await, vec!["Hel", "Hello"]);

    let head = server.await.unwrap();
    assert!(head.starts_with("POST /models/gemini-1.5-flash:streamGenerateContent?alt=sse"));
    assert!(head.to_ascii_lowercase().contains("x-goog-api-key: test-key"));
}

#[tokio::test]
async fn ollama_ndjson_becomes_cumulative_chunks() {
    let body = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"H\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"é\"},\"done\":false}\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
    );
    let (base, server) = serve_once("200 OK", "application/x-ndjson", body).await;
    let adapter = OllamaAdapter::new(config(base, "llama3.2")).unwrap();

    let stream = adapter.send(streaming_request()).await.unwrap();
    assert_eq!(texts(stream).await, vec!["H", "Hé"]);

    assert!(server.await.unwrap().starts_with("POST /api/chat"));
}

#[tokio::test]
async fn non_success_status_is_a_provider_error() {
    let (base, _server) = serve_once(
        "401 Unauthorized",
        "application/json",
        r#"{"error":{"message":"Incorrect API key provided"}}"#,
    )
    .await;
    let adapter = OpenAiAdapter::new(config(base, "gpt-4o-mini")).unwrap();

    let err = match adapter.send(plain_request()).await {
        Ok(_) => panic!("a 401 must not produce a stream"),
        Err(e) => e,
    };
    assert_eq!(err.backend, "OpenAI");
    let shown = err.to_string();
    assert!(shown.starts_with("Error from OpenAI: status=401 Unauthorized body="));
    assert!(shown.contains("Incorrect API key provided"));
}

#[tokio::test]
async fn null_content_is_an_empty_final() {
    let (base, _server) = serve_once(
        "200 OK",
        "application/json",
        r#"{"choices":[{"index":0,"message":{"role":"assistant","content":null},"finish_reason":"stop"}]}"#,
    )
    .await;
    let adapter = OpenAiAdapter::new(config(base, "gpt-4o-mini")).unwrap();

    let stream = adapter.send(plain_request()).await.unwrap();
    assert_eq!(
        collect_final(stream).await.unwrap(),
        ProviderResponse::Final {
            text: String::new()
        }
    );
}

#[tokio::test]
async fn anthropic_without_key_fails_before_sending() {
    let mut cfg = config("http://127.0.0.1:9".into(), "claude-3-haiku-20240307");
    cfg.api_key = None;
    let adapter = AnthropicAdapter::new(cfg).unwrap();

    match adapter.send(plain_request()).await {
        Ok(_) => panic!("missing key must be rejected"),
        Err(e) => assert_eq!(e.backend, "Anthropic"),
    }
}

#[tokio::test]
async fn stream_error_event_ends_the_stream() {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"H\"}}]}\n\n",
        "data: {\"error\":{\"message\":\"quota exceeded\"}}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"e\"}}]}\n\n",
    );
    let (base, _server) = serve_once("200 OK", "text/event-stream", body).await;
    let adapter = OpenAiAdapter::new(config(base, "gpt-4o-mini")).unwrap();

    let items: Vec<_> = adapter.send(streaming_request()).await.unwrap().collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap().text(), Some("H"));
    let err = items[1].as_ref().unwrap_err();
    assert_eq!(err.to_string(), "Error from OpenAI: quota exceeded");
}
