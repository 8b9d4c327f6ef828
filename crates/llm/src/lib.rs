//! HelpHub LLM Service
//!
//! Provides text completion for the chat features with support for:
//! - OpenAI-compatible chat completions API for production
//! - Mock service for testing and development
//! - Task helpers built on top of completion: message translation,
//!   conversation summaries, chat title generation, help request
//!   extraction, and the help assistant chatbot

pub mod mock;
pub mod openai;
pub mod tasks;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tasks::{
    chatbot_reply, generate_chat_title, parse_help_request, summarize_conversation,
    translate_message, HelpCategory, ParsedHelpRequest, Participant, SummaryInput,
    TargetLanguage, TitleInput, TranscriptLine, Urgency, UserContext, FALLBACK_CHAT_TITLE,
    UNSPECIFIED_CITY,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_MAX_TOKENS: u32 = 500;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM request error: {0}")]
    Request(String),

    #[error("LLM response error: {0}")]
    Response(String),

    #[error("LLM rate limit exceeded")]
    RateLimit,

    #[error("LLM returned an empty completion")]
    EmptyCompletion,

    /// The model could not extract what it was asked for; the message is user-facing
    #[error("{0}")]
    InsufficientInformation(String),
}

/// Speaker of a message in a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::Assistant,
            content: content.into(),
        }
    }
}

/// Provider-agnostic completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model name; empty means the service default
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    /// Ask the provider for a single JSON object
    pub json_output: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub stop_reason: String,
}

/// LLM service configuration.
#[derive(Clone)]
pub struct LlmConfig {
    /// LLM provider (openai, mock)
    pub provider: String,
    pub api_key: String,
    /// Override for the API host, e.g. a compatible gateway
    pub base_url: Option<String>,
    pub default_model: String,
    pub max_tokens: u32,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmConfig {
    /// Create LLM config from environment variables.
    pub fn from_env() -> Result<Self, LlmError> {
        dotenvy::dotenv().ok();

        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();

        if provider == "openai" && api_key.is_empty() {
            return Err(LlmError::Configuration(
                "OPENAI_API_KEY is required for openai provider".to_string(),
            ));
        }

        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .filter(|v| !v.is_empty());
        let default_model =
            std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("LLM_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        Ok(Self {
            provider,
            api_key,
            base_url,
            default_model,
            max_tokens,
        })
    }
}

/// LLM service trait for different implementations.
#[async_trait::async_trait]
pub trait LlmService: Send + Sync {
    /// Run a single chat completion.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Model used when a request leaves `model` empty.
    fn default_model(&self) -> &str;
}

/// Factory for creating LlmService implementations.
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    /// Create an LlmService based on configuration.
    pub fn create(config: LlmConfig) -> Result<Box<dyn LlmService>, LlmError> {
        match config.provider.as_str() {
            "openai" => {
                tracing::info!(model = %config.default_model, "Creating OpenAI LLM service");
                if config.api_key.is_empty() {
                    return Err(LlmError::Configuration(
                        "OPENAI_API_KEY is required for openai provider".to_string(),
                    ));
                }
                Ok(Box::new(openai::OpenAiService::new(config)))
            }
            "mock" => {
                tracing::info!("Creating mock LLM service");
                Ok(Box::new(mock::MockLlmService::new()))
            }
            provider => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: openai, mock",
                provider
            ))),
        }
    }
}
