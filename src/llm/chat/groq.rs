use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION}};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{http_stream_generate, sse_data, ChatClient, LineResult, Message, TokenStream};
use crate::llm::{LlmConfig, LlmError, LlmType};

pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

pub struct GroqChatClient {
    http: HttpClient,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GroqRequest<'a> {
    messages: &'a [Message],
    model: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GroqStreamResponse {
    #[serde(default)]
    choices: Vec<GroqStreamChoice>,
    #[serde(default)]
    x_groq: Option<GroqMeta>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct GroqStreamChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    delta: Option<GroqDelta>,
}

#[derive(Deserialize)]
struct GroqDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct GroqMeta {
    #[serde(default)]
    error: Option<Value>,
}

fn error_text(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        _ => err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
    }
}

pub fn parse_stream_line(line: &str) -> LineResult {
    let Some(data) = sse_data(line) else {
        return Ok(None);
    };
    let stream_resp = match serde_json::from_str::<GroqStreamResponse>(data) {
        Ok(r) => r,
        Err(e) => {
            debug!("Failed to parse Groq chunk: {}, error: {}", data, e);
            return Ok(None);
        }
    };

    let err = stream_resp.error.or_else(|| stream_resp.x_groq.and_then(|meta| meta.error));
    if let Some(err) = err.filter(|e| !e.is_null()) {
        return Err(LlmError::Stream(error_text(&err)));
    }

    Ok(stream_resp.choices
        .into_iter()
        .find(|choice| choice.index == 0)
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty()))
}

impl GroqChatClient {
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
            .ok_or(LlmError::MissingCredential(LlmType::Groq))?;

        Self::new(
            api_key,
            config.completion_model.clone(),
            config.base_url.clone(),
        )
    }
}

#[async_trait]
impl ChatClient for GroqChatClient {
    async fn stream_chat(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let req = GroqRequest {
            messages,
            model: &self.model,
            stream: true,
        };
        http_stream_generate(&self.http, &url, req, parse_stream_line, None).await
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_base_url(&self) -> Option<String> {
        Some(self.base_url.clone())
    }
}
