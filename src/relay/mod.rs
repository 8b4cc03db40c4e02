pub mod prompt;

use futures::{ stream, Stream, StreamExt };
use log::{ error, info, warn };
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

use crate::llm::chat::{ new_client, ChatClient, Message, TokenStream };
use crate::llm::{ LlmConfig, LlmError };
use crate::models::chat::ChatTurn;
use crate::sse::StreamEvent;
use self::prompt::SYSTEM_PROMPT;

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Misconfigured(String),
    #[error("Upstream API error: {0}")]
    Upstream(#[source] LlmError),
}

/// Checks the `messages` field of a relay request and turns it into turns.
pub fn parse_turns(messages: Option<Value>) -> Result<Vec<ChatTurn>, RelayError> {
    let items = match messages {
        Some(Value::Array(items)) => items,
        _ => return Err(RelayError::InvalidRequest("Messages array is required".into())),
    };
    if items.is_empty() {
        return Err(RelayError::InvalidRequest("Messages array must not be empty".into()));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<ChatTurn>(item).map_err(|e|
                RelayError::InvalidRequest(format!("Invalid message at index {}: {}", i, e))
            )
        })
        .collect()
}

/// Stateless streaming relay. Holds nothing but the upstream client, so one
/// instance serves any number of concurrent requests.
#[derive(Clone)]
pub struct Relay {
    chat_client: Option<Arc<dyn ChatClient>>,
    misconfigured_reason: String,
}

impl Relay {
    pub fn new(chat_client: Arc<dyn ChatClient>) -> Self {
        Self { chat_client: Some(chat_client), misconfigured_reason: String::new() }
    }

    /// A relay that answers every call with `Misconfigured`.
    pub fn unconfigured(reason: impl Into<String>) -> Self {
        Self { chat_client: None, misconfigured_reason: reason.into() }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        match new_client(config) {
            Ok(client) => {
                info!(
                    "Chat relay using {} model '{}' at {}",
                    config.llm_type,
                    client.get_model(),
                    client.get_base_url().unwrap_or_default()
                );
                Ok(Self::new(client))
            }
            Err(e @ LlmError::MissingCredential(_)) => {
                warn!("WARNING: {}; /api/llm will answer with an error", e);
                Ok(Self::unconfigured(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.chat_client.is_some()
    }

    pub async fn relay(&self, turns: &[ChatTurn]) -> Result<EventStream, RelayError> {
        if turns.is_empty() {
            return Err(RelayError::InvalidRequest("Messages array must not be empty".into()));
        }
        let client = self.chat_client
            .as_ref()
            .ok_or_else(|| RelayError::Misconfigured(self.misconfigured_reason.clone()))?;

        info!("Relaying conversation with {} turn(s)", turns.len());
        let messages = with_system_prompt(turns);
        let tokens = client.stream_chat(&messages).await.map_err(|e| {
            error!("Upstream stream error: {}", e);
            RelayError::Upstream(e)
        })?;

        Ok(into_events(tokens))
    }
}

fn with_system_prompt(turns: &[ChatTurn]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(turns.len() + 1);
    messages.push(Message::new("system", SYSTEM_PROMPT));
    messages.extend(turns.iter().map(|t| Message::new(t.role.as_str(), t.content.clone())));
    messages
}

/// One `Fragment` per non-empty token, then `Done` once the upstream ends.
/// An upstream error ends the sequence without `Done`.
fn into_events(tokens: TokenStream) -> EventStream {
    let events = stream::unfold(Some(tokens), |state| async move {
        let mut tokens = state?;
        loop {
            match tokens.next().await {
                Some(Ok(text)) if text.is_empty() => continue,
                Some(Ok(text)) => return Some((StreamEvent::Fragment { text }, Some(tokens))),
                Some(Err(e)) => {
                    warn!("Upstream failed mid-stream, closing without [DONE]: {}", e);
                    return None;
                }
                None => return Some((StreamEvent::Done, None)),
            }
        }
    });
    Box::pin(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct ScriptedClient {
        items: Vec<Result<String, String>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedClient {
        fn new(items: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self { items, seen: Mutex::new(Vec::new()) })
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn stream_chat(&self, messages: &[Message]) -> Result<TokenStream, LlmError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            let items: Vec<Result<String, LlmError>> = self.items
                .iter()
                .cloned()
                .map(|item| item.map_err(|details| LlmError::Status { status: 502, details }))
                .collect();
            Ok(Box::pin(stream::iter(items)))
        }

        fn get_model(&self) -> String {
            "scripted".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    struct RejectingClient;

    #[async_trait]
    impl ChatClient for RejectingClient {
        async fn stream_chat(&self, _messages: &[Message]) -> Result<TokenStream, LlmError> {
            Err(LlmError::Status { status: 401, details: "Incorrect API key".into() })
        }

        fn get_model(&self) -> String {
            "rejecting".into()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    fn ok(s: &str) -> Result<String, String> {
        Ok(s.to_string())
    }

    #[tokio::test]
    async fn fragments_then_single_done() {
        let client = ScriptedClient::new(vec![ok("De "), ok(""), ok("kerndoelen "), ok("zijn...")]);
        let relay = Relay::new(client.clone());
        let events: Vec<_> = relay
            .relay(&[ChatTurn::user("Wiskunde kerndoelen groep 6")]).await
            .unwrap()
            .collect().await;

        assert_eq!(events, vec![
            StreamEvent::fragment("De "),
            StreamEvent::fragment("kerndoelen "),
            StreamEvent::fragment("zijn..."),
            StreamEvent::Done
        ]);
    }

    #[tokio::test]
    async fn system_prompt_is_prepended_upstream_only() {
        let client = ScriptedClient::new(vec![ok("x")]);
        let relay = Relay::new(client.clone());
        let turns = vec![ChatTurn::user("hoi"), ChatTurn::assistant("hallo"), ChatTurn::user("vak?")];
        let _ = relay.relay(&turns).await.unwrap().collect::<Vec<_>>().await;

        let seen = client.seen.lock().unwrap();
        let sent = &seen[0];
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[0].role, "system");
        assert_eq!(sent[0].content, SYSTEM_PROMPT);
        assert_eq!(sent[1], Message::new("user", "hoi"));
        assert_eq!(sent[3], Message::new("user", "vak?"));
    }

    #[tokio::test]
    async fn mid_stream_failure_ends_without_done() {
        let client = ScriptedClient::new(vec![ok("De "), Err("reset".into()), ok("never")]);
        let relay = Relay::new(client);
        let events: Vec<_> = relay.relay(&[ChatTurn::user("hoi")]).await.unwrap().collect().await;
        assert_eq!(events, vec![StreamEvent::fragment("De ")]);
    }

    #[tokio::test]
    async fn empty_upstream_still_terminates() {
        let relay = Relay::new(ScriptedClient::new(vec![]));
        let events: Vec<_> = relay.relay(&[ChatTurn::user("hoi")]).await.unwrap().collect().await;
        assert_eq!(events, vec![StreamEvent::Done]);
    }

    #[tokio::test]
    async fn missing_credential_is_misconfigured() {
        let relay = Relay::unconfigured("openai API key not configured");
        match relay.relay(&[ChatTurn::user("hoi")]).await {
            Err(RelayError::Misconfigured(msg)) => assert!(msg.contains("API key")),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected Misconfigured"),
        }
    }

    #[tokio::test]
    async fn invalid_input_wins_over_missing_credential() {
        let relay = Relay::unconfigured("no key");
        assert!(matches!(relay.relay(&[]).await, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn pre_stream_rejection_is_upstream_error() {
        let relay = Relay::new(Arc::new(RejectingClient));
        match relay.relay(&[ChatTurn::user("hoi")]).await {
            Err(RelayError::Upstream(LlmError::Status { status, .. })) => assert_eq!(status, 401),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected Upstream"),
        }
    }

    #[tokio::test]
    async fn identical_requests_yield_identical_streams() {
        let relay = Relay::new(ScriptedClient::new(vec![ok("a"), ok("b")]));
        let turns = [ChatTurn::user("hoi")];
        let first: Vec<_> = relay.relay(&turns).await.unwrap().collect().await;
        let second: Vec<_> = relay.relay(&turns).await.unwrap().collect().await;
        assert_eq!(first, second);
    }

    #[test]
    fn parse_turns_rejects_bad_shapes() {
        assert!(parse_turns(None).is_err());
        assert!(parse_turns(Some(json!("nope"))).is_err());
        assert!(parse_turns(Some(json!([]))).is_err());
        assert!(parse_turns(Some(json!([{ "role": "user" }]))).is_err());
        assert!(parse_turns(Some(json!([{ "role": "robot", "content": "x" }]))).is_err());

        let turns = parse_turns(Some(json!([{ "role": "user", "content": "hoi" }]))).unwrap();
        assert_eq!(turns, vec![ChatTurn::user("hoi")]);
    }
}
