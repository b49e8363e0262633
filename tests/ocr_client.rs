//! `OcrClient` against a one-shot local HTTP responder.
//!
//! Each test binds 127.0.0.1:0, answers a single request with a canned
//! response, and hands back the raw request for inspection.

use dots_ocr::{EndpointConfig, MimeType, OcrBackend, OcrClient, OcrResult, PageError, PipelineConfig};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn client(base_url: &str) -> OcrClient {
    let config = PipelineConfig::builder()
        .endpoint(EndpointConfig {
            base_url: base_url.to_string(),
            token: "secret".into(),
            model: "dots-ocr".into(),
        })
        .request_timeout_secs(1)
        .health_timeout_secs(1)
        .build()
        .unwrap();
    OcrClient::new(&config).unwrap()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Read one HTTP/1.1 request: headers plus `Content-Length` bytes of body.
async fn read_request(sock: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = sock.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(end) = find(&buf, b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .map(|v| v.trim().parse::<usize>().unwrap())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Answer exactly one request with `status` and `body`.
async fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let request = read_request(&mut sock).await;
        let reason = match status {
            200 => "OK",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Unknown",
        };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        sock.write_all(response.as_bytes()).await.unwrap();
        let _ = sock.shutdown().await;
        request
    });
    (format!("http://{addr}"), handle)
}

// ── Recognise ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recognize_sends_contract_request_and_reads_first_choice() {
    let (url, server) =
        serve_once(200, r#"{"choices":[{"message":{"role":"assistant","content":"Hello page"}}]}"#)
            .await;

    let result = client(&url).recognize(b"png-bytes", MimeType::Png).await;
    assert_eq!(
        result,
        OcrResult::Recognized {
            text: "Hello page".into()
        }
    );

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /v1/chat/completions "), "got: {request}");
    assert!(request.to_lowercase().contains("authorization: bearer secret"));

    let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
    let json: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(json["model"], "dots-ocr");
    assert_eq!(json["max_tokens"], 2048);
    let parts = &json["messages"][0]["content"];
    assert_eq!(json["messages"][0]["role"], "user");
    assert_eq!(parts[0]["type"], "image_url");
    assert_eq!(
        parts[0]["image_url"]["url"],
        "data:image/png;base64,cG5nLWJ5dGVz"
    );
    assert_eq!(parts[1]["type"], "text");
    assert_eq!(parts[1]["text"], "Extract all text from this document.");
}

#[tokio::test]
async fn non_200_keeps_status_and_body() {
    let (url, server) = serve_once(500, "model crashed").await;

    let result = client(&url).recognize(b"x", MimeType::Jpeg).await;
    assert_eq!(
        result,
        OcrResult::Failed {
            error: PageError::HttpStatus {
                status: 500,
                body: "model crashed".into()
            }
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn non_json_200_falls_back_to_raw_body() {
    let (url, server) = serve_once(200, "plain text answer").await;

    let result = client(&url).recognize(b"x", MimeType::Png).await;
    assert_eq!(
        result,
        OcrResult::Unparsed {
            body: "plain text answer".into()
        }
    );
    server.await.unwrap();
}

#[tokio::test]
async fn stalled_server_times_out() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let _server = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        read_request(&mut sock).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(sock);
    });

    let result = client(&url).recognize(b"x", MimeType::Png).await;
    assert_eq!(result.error(), Some(&PageError::Timeout { secs: 1 }));
}

// ── Health ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_200_is_healthy() {
    let (url, server) = serve_once(200, "").await;

    assert!(client(&url).check_health().await);
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /health "), "got: {request}");
}

#[tokio::test]
async fn health_503_is_unhealthy() {
    let (url, server) = serve_once(503, "loading").await;

    assert!(!client(&url).check_health().await);
    server.await.unwrap();
}

#[tokio::test]
async fn refused_connection_is_unhealthy_and_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = client(&url);
    assert!(!client.check_health().await);
    match client.recognize(b"x", MimeType::Png).await {
        OcrResult::Failed {
            error: PageError::Transport { .. },
        } => {}
        other => panic!("expected transport failure, got {other:?}"),
    }
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_tolerated() {
    let (url, server) = serve_once(200, "").await;
    let endpoint = EndpointConfig::from_lookup(|key| {
        (key == dots_ocr::config::ENV_URL).then(|| format!("{url}/"))
    })
    .unwrap();
    let config = PipelineConfig::builder().endpoint(endpoint).build().unwrap();

    assert!(OcrClient::new(&config).unwrap().check_health().await);
    let request = server.await.unwrap();
    assert!(request.starts_with("GET /health "), "got: {request}");
}
