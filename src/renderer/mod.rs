//! Client side of the chat: sends the replayed history, reads the event
//! stream incrementally and keeps the session state.

pub mod export;
pub mod session;

use futures::{ Stream, StreamExt };
use log::{ debug, error };
use reqwest::Client as HttpClient;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Display;
use std::sync::Mutex;
use thiserror::Error;
use url::Url;

use crate::models::chat::{ ChatTurn, OutgoingChatRequest };
use crate::sse::{ EventDecoder, StreamEvent };
pub use self::export::should_offer_export;
pub use self::session::ChatSession;

pub const GENERIC_ERROR_MESSAGE: &str =
    "Er is een fout opgetreden bij het verbinden met de assistent. Controleer of de server draait en de API keys correct zijn ingesteld.";

/// Where the conversation is displayed. Fragments are appended to the live
/// assistant entry; earlier content is never redrawn.
pub trait TranscriptView: Send {
    fn show_user(&mut self, text: &str);
    fn append(&mut self, fragment: &str);
    fn scroll_to_end(&mut self);
    fn end_assistant(&mut self);
    fn offer_export(&mut self);
    fn show_error(&mut self, message: &str);
    fn set_input_enabled(&mut self, enabled: bool);
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid server URL: {0}")]
    ServerUrl(#[from] url::ParseError),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Server returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
    },
    #[error("Stream ended before [DONE]")]
    Truncated,
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input, or another send was still in flight.
    Ignored,
    Completed {
        reply: String,
        export_offered: bool,
    },
    Failed,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Drives a byte stream to completion, handing every fragment to
/// `on_fragment`. Returns the accumulated text once `[DONE]` arrives; reading
/// stops there. A stream that ends first is `Truncated`.
pub async fn read_reply<S, B, E>(
    body: S,
    mut on_fragment: impl FnMut(&str)
) -> Result<String, RenderError>
    where S: Stream<Item = Result<B, E>>, B: AsRef<[u8]>, E: Display
{
    futures::pin_mut!(body);
    let mut decoder = EventDecoder::new();
    let mut full = String::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| RenderError::Transport(e.to_string()))?;
        for event in decoder.push(chunk.as_ref()) {
            match event {
                StreamEvent::Fragment { text } => {
                    full.push_str(&text);
                    on_fragment(&text);
                }
                StreamEvent::Done => {
                    return Ok(full);
                }
            }
        }
    }

    decoder.finish();
    Err(RenderError::Truncated)
}

pub struct Renderer<V: TranscriptView> {
    http: HttpClient,
    llm_url: Url,
    slo_url: Url,
    session: ChatSession,
    view: Mutex<V>,
}

impl<V: TranscriptView> Renderer<V> {
    pub fn new(server: &str, view: V) -> Result<Self, RenderError> {
        let mut base = Url::parse(server)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            http: HttpClient::new(),
            llm_url: base.join("api/llm")?,
            slo_url: base.join("api/slo")?,
            session: ChatSession::new(),
            view: Mutex::new(view),
        })
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    fn with_view<R>(&self, f: impl FnOnce(&mut V) -> R) -> R {
        let mut view = self.view.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut view)
    }

    /// One user turn: a no-op while another send is running.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        let Some(_busy) = self.session.try_begin() else {
            debug!("Send ignored, a reply is still streaming");
            return SendOutcome::Ignored;
        };

        self.with_view(|v| {
            v.show_user(text);
            v.set_input_enabled(false);
        });
        self.session.push(ChatTurn::user(text));

        let outcome = match self.stream_reply().await {
            Ok(reply) => {
                let export_offered = should_offer_export(&reply);
                self.session.push(ChatTurn::assistant(reply.clone()));
                self.with_view(|v| {
                    v.end_assistant();
                    if export_offered {
                        v.offer_export();
                    }
                });
                SendOutcome::Completed { reply, export_offered }
            }
            Err(e) => {
                error!("Error sending message: {}", e);
                self.with_view(|v| {
                    v.end_assistant();
                    v.show_error(GENERIC_ERROR_MESSAGE);
                });
                SendOutcome::Failed
            }
        };

        self.with_view(|v| v.set_input_enabled(true));
        outcome
    }

    async fn stream_reply(&self) -> Result<String, RenderError> {
        let history = self.session.history();
        let resp = self.http
            .post(self.llm_url.clone())
            .json(&(OutgoingChatRequest { messages: &history }))
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>().await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "API request failed".to_string());
            return Err(RenderError::Status { status: status.as_u16(), message });
        }

        read_reply(resp.bytes_stream(), |fragment| {
            self.with_view(|v| {
                v.append(fragment);
                v.scroll_to_end();
            })
        }).await
    }

    /// Fetches curriculum data through the server's `/api/slo` proxy.
    pub async fn fetch_curriculum(&self, params: &[(String, String)]) -> Result<Value, RenderError> {
        let resp = self.http.get(self.slo_url.clone()).query(params).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ErrorBody>().await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| "Failed to fetch SLO data".to_string());
            return Err(RenderError::Status { status: status.as_u16(), message });
        }
        Ok(resp.json::<Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: Vec<&'static str>) -> impl Stream<Item = Result<&'static [u8], String>> {
        stream::iter(parts.into_iter().map(|p| Ok(p.as_bytes())))
    }

    #[tokio::test]
    async fn accumulates_until_done() {
        let mut seen = Vec::new();
        let body = chunks(vec![
            "data: {\"choices\":[{\"delta\":{\"content\":\"De \"},\"index\":0}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"kern",
            "doelen\"},\"index\":0}]}\n\ndata: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"},\"index\":0}]}\n\n"
        ]);
        let text = read_reply(body, |f| seen.push(f.to_string())).await.unwrap();
        assert_eq!(text, "De kerndoelen");
        assert_eq!(seen, vec!["De ", "kerndoelen"]);
    }

    #[tokio::test]
    async fn missing_done_is_truncated() {
        let body = chunks(vec!["data: {\"choices\":[{\"delta\":{\"content\":\"De \"}}]}\n\ndata: [DO"]);
        assert!(matches!(read_reply(body, |_| {}).await, Err(RenderError::Truncated)));
    }

    #[tokio::test]
    async fn transport_error_surfaces() {
        let body = stream::iter(vec![Ok(b"data: ".as_slice()), Err("connection reset".to_string())]);
        match read_reply(body, |_| {}).await {
            Err(RenderError::Transport(msg)) => assert_eq!(msg, "connection reset"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_event_does_not_abort() {
        let body = chunks(vec![
            ": padding\n\ndata: {not json\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n"
        ]);
        assert_eq!(read_reply(body, |_| {}).await.unwrap(), "ok");
    }
}
