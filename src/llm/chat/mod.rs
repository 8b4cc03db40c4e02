pub mod openai;
pub mod groq;

use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ debug, info };
use serde::{ Deserialize, Serialize };
use std::pin::Pin;
use std::sync::Arc;
use super::{ LlmConfig, LlmError, LlmType };
use self::openai::OpenAIChatClient;
use self::groq::GroqChatClient;
use crate::sse::{ SseLineDecoder, DATA_PREFIX, DONE_SENTINEL };
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Lazy sequence of text fragments in upstream order. An `Err` item means the
/// upstream failed after streaming had started; nothing follows it.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// What an adapter makes of one upstream line: text to relay, nothing, or an
/// error the provider reported inside the stream.
pub type LineResult = Result<Option<String>, LlmError>;

/// Message as sent upstream. Unlike `ChatTurn` this admits the `system` role.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Opens a streaming completion. Failures before the first byte of the
    /// body (transport, non-success status) are returned here rather than
    /// through the stream.
    async fn stream_chat(&self, messages: &[Message]) -> Result<TokenStream, LlmError>;

    fn get_model(&self) -> String;
    fn get_base_url(&self) -> Option<String>;
}

pub fn new_client(config: &LlmConfig) -> Result<Arc<dyn ChatClient>, LlmError> {
    let client: Arc<dyn ChatClient> = match config.llm_type {
        LlmType::OpenAI => {
            let specific_client = OpenAIChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
        LlmType::Groq => {
            let specific_client = GroqChatClient::from_config(config)?;
            Arc::new(specific_client)
        }
    };
    Ok(client)
}

/// Extracts the JSON payload of an upstream `data:` line, or `None` for
/// comments, other fields, and the terminal sentinel.
pub fn sse_data(line: &str) -> Option<&str> {
    let data = line
        .strip_prefix(DATA_PREFIX)
        .or_else(|| line.strip_prefix("data:"))?
        .trim_start();
    if data.is_empty() || data == DONE_SENTINEL {
        None
    } else {
        Some(data)
    }
}

fn is_done_line(line: &str) -> bool {
    line.strip_prefix("data:").map(str::trim) == Some(DONE_SENTINEL)
}

pub async fn http_stream_generate(
    client: &reqwest::Client,
    url: &str,
    payload: impl serde::Serialize,
    line_parser: fn(&str) -> LineResult,
    headers: Option<Vec<(String, String)>>,
) -> Result<TokenStream, LlmError> {
    let mut req = client.post(url).json(&payload);

    if let Some(header_list) = headers {
        for (name, value) in header_list {
            req = req.header(name, value);
        }
    }

    info!("Opening upstream stream to {}", url);
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let details = resp.text().await.unwrap_or_default();
        return Err(LlmError::Status { status: status.as_u16(), details });
    }

    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut bytes = resp.bytes_stream();
        let mut lines = SseLineDecoder::new();

        while let Some(chunk) = bytes.next().await {
            match chunk {
                Ok(buf) => {
                    for line in lines.push(&buf) {
                        if is_done_line(&line) {
                            return;
                        }
                        match line_parser(&line) {
                            Ok(Some(tok)) => {
                                if tx.send(Ok(tok)).await.is_err() {
                                    debug!("Downstream dropped, abandoning upstream stream");
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(LlmError::Http(e))).await;
                    return;
                }
            }
        }
        lines.finish();
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}
