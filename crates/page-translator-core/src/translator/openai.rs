use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::config::{DEFAULT_API_BASE, Lang, TranslatorConfig};
use crate::error::{Error, Result};
use super::sse::{SseDecoder, SseEvent};
use super::traits::{FragmentSink, Translator, TranslatorInfo};

/// Wait used for HTTP 429 responses without a `Retry-After` header
const DEFAULT_RATE_LIMIT_WAIT_SECS: u64 = 5;

/// OpenAI-compatible chat-completions translator.
/// Works with: OpenAI, llama.cpp server, Ollama, DeepSeek, etc.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "https://api.openai.com/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    pub temperature: f32,
    /// Number of attempts to obtain a response
    pub retry_count: u32,
    /// Delay between attempts in milliseconds
    pub retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// One `data:` payload of a streamed completion
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl OpenAiTranslator {
    /// Create a translator from its configuration
    pub fn new(config: &TranslatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::TranslationRequest(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            retry_count: config.retry_count.max(1),
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// The hosted API refuses anonymous requests; local servers usually don't
    fn needs_api_key(&self) -> bool {
        self.api_base.trim_end_matches('/') == DEFAULT_API_BASE
    }

    fn create_request(&self, text: &str, source: &Lang, target: &Lang, stream: bool) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: system_prompt(source, target),
                },
                Message {
                    role: "user",
                    content: text.to_string(),
                },
            ],
            temperature: self.temperature,
            stream,
        }
    }

    /// POST the request until a successful status comes back.
    ///
    /// Retries cover connection failures, timeouts, 429 and 5xx responses.
    /// Nothing has been handed to a sink yet at this point, so retrying
    /// cannot duplicate output. The error of the last attempt is returned.
    async fn send_with_retry(&self, request: &ChatRequest) -> Result<Response> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let retry_delay = Duration::from_millis(self.retry_delay_ms);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Translation request attempt {}/{} to {}",
                attempt, self.retry_count, url
            );

            let mut req = self.client.post(&url).json(request);
            if let Some(ref key) = self.api_key {
                req = req.bearer_auth(key);
            }

            let (err, wait) = match req.send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let retry_after = response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok());

                    warn!("Rate limited, retry after {:?}s", retry_after);
                    let wait = Duration::from_secs(retry_after.unwrap_or(DEFAULT_RATE_LIMIT_WAIT_SECS));
                    (Error::TranslationRateLimited { retry_after }, wait)
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    warn!("API error: {} - {}", status, body);
                    let err = Error::TranslationRequest(format!("HTTP {status}: {body}"));
                    if !status.is_server_error() {
                        return Err(err);
                    }
                    (err, retry_delay)
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    let err = if e.is_timeout() {
                        Error::TranslationTimeout
                    } else {
                        Error::TranslationRequest(e.to_string())
                    };
                    (err, retry_delay)
                }
            };

            if attempt >= self.retry_count {
                error!("Translation failed after {} attempts", attempt);
                return Err(err);
            }
            tokio::time::sleep(wait).await;
        }
    }

    /// Block until the whole completion is available
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let response = self.send_with_retry(request).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::TranslationInvalidResponse(e.to_string()))?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::TranslationInvalidResponse("No choices in response".to_string()))?;

        finish_translation(&content)
    }

    /// Stream the completion, forwarding each content delta to `sink`
    async fn stream(&self, request: &ChatRequest, sink: &mut dyn FragmentSink) -> Result<String> {
        let response = self.send_with_retry(request).await?;

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut translated = String::new();
        let mut received = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                if e.is_timeout() {
                    Error::TranslationTimeout
                } else {
                    Error::TranslationRequest(format!("Stream interrupted: {e}"))
                }
            })?;
            received += chunk.len();

            for event in decoder.push(&chunk) {
                if apply_event(event, &mut translated, sink)? {
                    return finish_translation(&translated);
                }
            }
        }

        if let Some(event) = decoder.finish()
            && apply_event(event, &mut translated, sink)?
        {
            return finish_translation(&translated);
        }

        warn!("Completion stream closed without end marker");
        Err(Error::TranslationIncomplete { received })
    }
}

/// Handle one stream event. Returns `true` once the end marker is seen.
fn apply_event(event: SseEvent, translated: &mut String, sink: &mut dyn FragmentSink) -> Result<bool> {
    match event {
        SseEvent::Done => Ok(true),
        SseEvent::Data(payload) => {
            let chunk: StreamChunk = serde_json::from_str(&payload)
                .map_err(|e| Error::TranslationInvalidResponse(format!("Bad stream chunk: {e}")))?;

            if let Some(api_error) = chunk.error {
                return Err(Error::TranslationRequest(api_error.message));
            }

            if let Some(delta) = chunk
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta.content)
                .filter(|content| !content.is_empty())
            {
                translated.push_str(&delta);
                sink.on_fragment(&delta);
            }
            Ok(false)
        }
    }
}

/// The committed text is exactly what the sink was given
fn finish_translation(content: &str) -> Result<String> {
    if content.trim().is_empty() {
        return Err(Error::TranslationInvalidResponse("Empty translation".to_string()));
    }
    Ok(content.to_string())
}

#[async_trait]
impl Translator for OpenAiTranslator {
    fn info(&self) -> TranslatorInfo {
        TranslatorInfo {
            name: "OpenAI Compatible",
            requires_api_key: self.needs_api_key(),
            supports_streaming: true,
        }
    }

    async fn translate(
        &self,
        text: &str,
        source: &Lang,
        target: &Lang,
        sink: Option<&mut dyn FragmentSink>,
    ) -> Result<String> {
        // Blank pages need no API call
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        if !self.is_available() {
            return Err(Error::TranslationMissingApiKey);
        }

        match sink {
            Some(sink) => {
                let request = self.create_request(text, source, target, true);
                self.stream(&request, sink).await
            }
            None => {
                let request = self.create_request(text, source, target, false);
                self.complete(&request).await
            }
        }
    }

    fn is_available(&self) -> bool {
        !self.needs_api_key() || self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }
}

fn system_prompt(source: &Lang, target: &Lang) -> String {
    if source.as_str() == "auto" {
        format!(
            "Please translate the following text into {}.",
            language_name(target)
        )
    } else {
        format!(
            "Please translate the following {} text into {}.",
            language_name(source),
            language_name(target)
        )
    }
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &str {
    match lang.as_str() {
        "en" => "English",
        "ja" => "Japanese",
        "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        // The model understands most ISO codes as they are
        other => other,
    }
}
