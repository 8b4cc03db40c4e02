use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};

use super::{http_stream_generate, sse_data, ChatClient, LineResult, Message, TokenStream};
use crate::llm::{LlmConfig, LlmError, LlmType};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    #[serde(default)]
    error: Option<OpenAIStreamError>,
}

#[derive(Deserialize)]
struct OpenAIStreamError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    #[serde(default)]
    delta: Option<OpenAIDelta>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

/// Text of the first choice's delta, the only part of a chunk we relay. A
/// chunk carrying an `error` object ends the stream.
pub fn parse_stream_line(line: &str) -> LineResult {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    let stream_resp = match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(r) => r,
        Err(e) => {
            debug!("JSON parse error: {} for data: {}", e, data);
            return Ok(None);
        }
    };

    if let Some(err) = stream_resp.error {
        let message = err.message.unwrap_or_else(|| data.to_string());
        return Err(LlmError::Stream(match err.kind {
            Some(kind) => format!("{}: {}", kind, message),
            None => message,
        }));
    }

    Ok(stream_resp.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

impl OpenAIChatClient {
    pub fn new(
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, LlmError> {
        let chat_model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| LlmError::InvalidConfig(format!("Invalid API key format: {}", e)))?
        );

        let http = HttpClient::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            model: chat_model,
            base_url: api_url,
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config.api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingCredential(LlmType::OpenAI))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let req = OpenAIChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };
        http_stream_generate(&self.http, &self.completions_url(), req, parse_stream_line, None).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_delta() {
        let line = r#"data: {"id":"c1","object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hoi"},"finish_reason":null}]}"#;
        assert_eq!(parse_stream_line(line).unwrap(), Some("Hoi".to_string()));
    }

    #[test]
    fn role_only_and_finish_chunks_carry_no_text() {
        let role = r#"data: {"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#;
        let stop = r#"data: {"choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_stream_line(role).unwrap(), None);
        assert_eq!(parse_stream_line(stop).unwrap(), None);
        assert_eq!(parse_stream_line("data: [DONE]").unwrap(), None);
        assert_eq!(parse_stream_line("data: {broken").unwrap(), None);
    }

    #[test]
    fn error_chunk_is_reported() {
        let line = r#"data: {"error":{"message":"The server had an error","type":"server_error"}}"#;
        match parse_stream_line(line) {
            Err(LlmError::Stream(msg)) => assert_eq!(msg, "server_error: The server had an error"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn default_endpoint_is_chat_completions() {
        let client = OpenAIChatClient::new("sk-test".into(), None, None).unwrap();
        assert_eq!(client.completions_url(), "https://api.openai.com/v1/chat/completions");
        assert_eq!(client.get_model(), DEFAULT_MODEL);
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = LlmConfig { api_key: Some("  ".into()), ..LlmConfig::default() };
        assert!(matches!(
            OpenAIChatClient::from_config(&config),
            Err(LlmError::MissingCredential(LlmType::OpenAI))
        ));
    }
}
