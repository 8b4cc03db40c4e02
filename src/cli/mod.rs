use clap::Parser;

use crate::llm::{ parse_llm_type, LlmConfig, LlmType };

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- HTTP Server Args ---
    /// Host address the HTTP server binds to.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "PORT", default_value = "3000")]
    pub port: u16,

    /// Directory holding the single-page chat UI, served at `/`.
    #[arg(long, env = "STATIC_DIR", default_value = "public")]
    pub static_dir: String,

    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (openai, groq)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "openai")]
    pub chat_llm_type: String,

    /// API Key for OpenAI. Checked on every /api/llm call, not only at startup.
    #[arg(long, env = "OPENAI_API_KEY", default_value = "", hide_env_values = true)]
    pub openai_api_key: String,

    /// API Key for Groq, used when CHAT_LLM_TYPE=groq.
    #[arg(long, env = "GROQ_API_KEY", default_value = "", hide_env_values = true)]
    pub groq_api_key: String,

    /// Base URL of the OpenAI API (e.g., https://api.openai.com/v1)
    #[arg(long, env = "OPENAI_BASE_URL")] // No default, let adapters handle defaults if None
    pub openai_base_url: Option<String>,

    /// OpenAI model for chat completion (e.g., gpt-4o-mini)
    #[arg(long, env = "OPENAI_MODEL")] // No default, rely on adapter defaults if None
    pub openai_model: Option<String>,

    /// Base URL of the Groq API (e.g., https://api.groq.com/openai/v1)
    #[arg(long, env = "GROQ_BASE_URL")]
    pub groq_base_url: Option<String>,

    /// Groq model for chat completion (e.g., llama-3.1-8b-instant)
    #[arg(long, env = "GROQ_MODEL")]
    pub groq_model: Option<String>,

    // --- SLO Curriculum API Args ---
    /// Bearer token for the SLO open-data API.
    #[arg(long, env = "SLO_API_KEY", default_value = "", hide_env_values = true)]
    pub slo_api_key: String,

    /// Base URL of the SLO curriculum API.
    #[arg(long, env = "SLO_BASE_URL")]
    pub slo_base_url: Option<String>,
}

impl Args {
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn chat_llm_config(&self) -> Result<LlmConfig, String> {
        let llm_type = parse_llm_type(&self.chat_llm_type)?;
        // Overrides only apply to the provider they are named after.
        let (key, model, base_url) = match llm_type {
            LlmType::OpenAI => (&self.openai_api_key, &self.openai_model, &self.openai_base_url),
            LlmType::Groq => (&self.groq_api_key, &self.groq_model, &self.groq_base_url),
        };

        Ok(LlmConfig {
            llm_type,
            api_key: Some(key.clone()).filter(|k| !k.trim().is_empty()),
            completion_model: model.clone().filter(|m| !m.is_empty()),
            base_url: base_url.clone().filter(|u| !u.is_empty()),
        })
    }

    pub fn slo_key(&self) -> Option<String> {
        Some(self.slo_api_key.clone()).filter(|k| !k.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_key_is_absent() {
        let args = Args::parse_from(["dacapo-server", "--openai-api-key", ""]);
        let config = args.chat_llm_config().unwrap();
        assert_eq!(config.llm_type, LlmType::OpenAI);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn groq_uses_its_own_key() {
        let args = Args::parse_from([
            "dacapo-server",
            "--chat-llm-type",
            "groq",
            "--groq-api-key",
            "gsk-1",
            "--openai-api-key",
            "sk-1",
        ]);
        let config = args.chat_llm_config().unwrap();
        assert_eq!(config.llm_type, LlmType::Groq);
        assert_eq!(config.api_key.as_deref(), Some("gsk-1"));
    }

    #[test]
    fn openai_overrides_do_not_leak_into_groq() {
        let args = Args::parse_from([
            "dacapo-server",
            "--chat-llm-type",
            "groq",
            "--groq-api-key",
            "gsk-1",
            "--openai-model",
            "gpt-4o-mini",
            "--openai-base-url",
            "https://api.openai.com/v1",
        ]);
        let config = args.chat_llm_config().unwrap();
        assert!(config.completion_model.is_none());
        assert!(config.base_url.is_none());

        let args = Args::parse_from([
            "dacapo-server",
            "--chat-llm-type",
            "groq",
            "--groq-model",
            "llama-3.3-70b-versatile",
        ]);
        let config = args.chat_llm_config().unwrap();
        assert_eq!(config.completion_model.as_deref(), Some("llama-3.3-70b-versatile"));
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let args = Args::parse_from(["dacapo-server", "--chat-llm-type", "ollama"]);
        assert!(args.chat_llm_config().is_err());
    }
}
