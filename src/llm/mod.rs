pub mod chat;
use serde::{ Deserialize, Serialize };
use std::str::FromStr;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmType {
    OpenAI,
    Groq,
}

impl fmt::Display for LlmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmType::OpenAI => write!(f, "openai"),
            LlmType::Groq => write!(f, "groq"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseLlmTypeError {
    message: String,
}

impl fmt::Display for ParseLlmTypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseLlmTypeError {}
impl FromStr for LlmType {
    type Err = ParseLlmTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmType::OpenAI),
            "groq" => Ok(LlmType::Groq),
            _ =>
                Err(ParseLlmTypeError {
                    message: format!("Invalid LLM type: '{}'", s),
                }),
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{0} API key not configured")]
    MissingCredential(LlmType),
    #[error("Invalid client configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("Upstream returned {status}: {details}")]
    Status {
        status: u16,
        details: String,
    },
    #[error("Upstream stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub llm_type: LlmType,
    pub api_key: Option<String>,
    pub completion_model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            llm_type: LlmType::OpenAI,
            api_key: None,
            completion_model: None,
            base_url: None,
        }
    }
}

pub fn parse_llm_type(type_str: &str) -> Result<LlmType, String> {
    type_str
        .parse::<LlmType>()
        .map_err(|_| format!("Unsupported LLM type: {}", type_str))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_providers_case_insensitively() {
        assert_eq!(parse_llm_type("OpenAI"), Ok(LlmType::OpenAI));
        assert_eq!(parse_llm_type("groq"), Ok(LlmType::Groq));
        assert!(parse_llm_type("ollama").is_err());
    }

    #[test]
    fn missing_credential_names_provider() {
        let err = LlmError::MissingCredential(LlmType::OpenAI);
        assert_eq!(err.to_string(), "openai API key not configured");
    }
}
