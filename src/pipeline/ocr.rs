//! Inference calls: one page image → one chat-completion request.
//!
//! The endpoint speaks the OpenAI chat-completions dialect served by vLLM.
//! Each request carries a single user message with two content parts: the
//! page as a base64 data URI and a fixed instruction. No retry happens here;
//! a non-200 becomes an [`OcrResult::Failed`] and the caller moves on.
//!
//! A 200 whose body does not decode as a chat completion is kept as
//! [`OcrResult::Unparsed`] with the raw body. Some server builds return bare
//! text for this model, and dropping a successful response would lose a
//! page that was in fact recognised.

use crate::config::{EndpointConfig, PipelineConfig};
use crate::error::{PageError, PipelineError};
use crate::output::OcrResult;
use crate::pipeline::detect::MimeType;
use crate::pipeline::encode::data_uri;
use crate::prompts::OCR_INSTRUCTION;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can answer health probes and recognise page images.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Human-readable location, used in error messages.
    fn endpoint(&self) -> &str;

    /// `true` only when the backend answered its health probe with 200.
    async fn check_health(&self) -> bool;

    /// Recognise one image. Never fails; failures are an `OcrResult` variant.
    async fn recognize(&self, image: &[u8], mime: MimeType) -> OcrResult;
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    ImageUrl { image_url: ImageUrl },
    Text { text: String },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Build the request body for one image.
pub fn build_request(image: &[u8], mime: MimeType, model: &str, max_tokens: usize) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: data_uri(image, mime),
                    },
                },
                ContentPart::Text {
                    text: OCR_INSTRUCTION.to_string(),
                },
            ],
        }],
        max_tokens,
    }
}

/// Turn a 200 body into text, falling back to the raw body.
pub fn parse_completion(body: String) -> OcrResult {
    match serde_json::from_str::<ChatCompletion>(&body) {
        Ok(completion) => match completion.choices.into_iter().next() {
            Some(choice) => OcrResult::Recognized {
                text: choice.message.content,
            },
            None => {
                debug!("Completion has no choices; keeping raw body");
                OcrResult::Unparsed { body }
            }
        },
        Err(e) => {
            debug!("Response is not a chat completion ({}); keeping raw body", e);
            OcrResult::Unparsed { body }
        }
    }
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// [`OcrBackend`] talking HTTP to the inference service.
#[derive(Debug, Clone)]
pub struct OcrClient {
    http: reqwest::Client,
    endpoint: EndpointConfig,
    max_tokens: usize,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl OcrClient {
    pub fn new(config: &PipelineConfig) -> Result<Self, PipelineError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| PipelineError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            max_tokens: config.max_tokens,
            request_timeout: config.request_timeout(),
            health_timeout: config.health_timeout(),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> PageError {
        if e.is_timeout() {
            PageError::Timeout {
                secs: self.request_timeout.as_secs(),
            }
        } else {
            PageError::Transport {
                detail: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl OcrBackend for OcrClient {
    fn endpoint(&self) -> &str {
        &self.endpoint.base_url
    }

    async fn check_health(&self) -> bool {
        let url = self.endpoint.health_url();
        match self.http.get(&url).timeout(self.health_timeout).send().await {
            Ok(resp) => {
                debug!("GET {} → {}", url, resp.status());
                resp.status() == StatusCode::OK
            }
            Err(e) => {
                debug!("GET {} failed: {}", url, e);
                false
            }
        }
    }

    async fn recognize(&self, image: &[u8], mime: MimeType) -> OcrResult {
        let request = build_request(image, mime, &self.endpoint.model, self.max_tokens);

        let response = match self
            .http
            .post(self.endpoint.completions_url())
            .bearer_auth(&self.endpoint.token)
            .timeout(self.request_timeout)
            .json(&request)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                let error = self.transport_error(e);
                warn!("OCR request failed: {}", error);
                return OcrResult::Failed { error };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return OcrResult::Failed {
                    error: self.transport_error(e),
                }
            }
        };

        if status == StatusCode::OK {
            parse_completion(body)
        } else {
            OcrResult::Failed {
                error: PageError::HttpStatus {
                    status: status.as_u16(),
                    body,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_body_matches_endpoint_contract() {
        let req = build_request(b"hello", MimeType::Png, "dots-ocr", 2048);
        let body = serde_json::to_value(&req).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "dots-ocr",
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,aGVsbG8="}},
                        {"type": "text", "text": "Extract all text from this document."}
                    ]
                }],
                "max_tokens": 2048
            })
        );
    }

    #[test]
    fn parses_first_choice_content() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Hello"}},{"message":{"content":"ignored"}}],"usage":{}}"#;
        assert_eq!(
            parse_completion(body.to_string()),
            OcrResult::Recognized { text: "Hello".into() }
        );
    }

    #[test]
    fn non_json_body_falls_back_to_raw_text() {
        assert_eq!(
            parse_completion("just text".into()),
            OcrResult::Unparsed { body: "just text".into() }
        );
    }

    #[test]
    fn schema_mismatch_falls_back_to_raw_text() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"result":"text"}"#,
        ] {
            assert_eq!(
                parse_completion(body.to_string()),
                OcrResult::Unparsed { body: body.into() },
                "{body}"
            );
        }
    }
}
