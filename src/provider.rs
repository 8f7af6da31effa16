use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cli::Provider;
use crate::config::{ProviderCredentials, RuntimeConfig};
use crate::error::redact_sensitive_text;

#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub system: String,
    pub prompt: String,
}

impl LlmRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
        }
    }
}

/// Text-in, text-out language model backend.
#[async_trait]
pub trait Llm: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &LlmRequest) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Client for any backend that speaks the OpenAI chat-completions protocol.
pub struct OpenAiCompatibleModel {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiCompatibleModel {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client for model provider")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            temperature,
        })
    }
}

#[async_trait]
impl Llm for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &LlmRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: &request.system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        tracing::debug!(model = %self.model, base_url = %self.base_url, "sending chat completion request");

        let mut http = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = self.api_key.as_deref() {
            http = http.bearer_auth(key);
        }

        let response = http
            .send()
            .await
            .context("chat completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "chat completion request returned {}: {}",
                status,
                redact_sensitive_text(&error_text)
            ));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("chat completion response was not valid JSON")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "chat completion returned no textual content for model '{}'",
                self.model
            ));
        }
        Ok(content)
    }
}

pub fn validate_model_for_provider(provider: Provider, model_name: &str) -> Result<()> {
    let is_valid = match provider {
        Provider::Openai => {
            model_name.starts_with("gpt-")
                || model_name.starts_with("o1")
                || model_name.starts_with("o3")
                || model_name.starts_with("o4")
        }
        Provider::Deepseek => model_name.starts_with("deepseek"),
        Provider::Groq => !model_name.trim().is_empty(),
        Provider::Ollama => !model_name.trim().is_empty(),
        Provider::Auto => true,
    };

    if is_valid {
        return Ok(());
    }

    Err(anyhow::anyhow!(
        "model '{}' is not compatible with provider '{:?}'",
        model_name,
        provider
    ))
}

pub fn default_model_for(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai | Provider::Auto => "gpt-4o-mini",
        Provider::Deepseek => "deepseek-chat",
        Provider::Groq => "llama-3.3-70b-versatile",
        Provider::Ollama => "llama3.1",
    }
}

pub fn resolve_model(cfg: &RuntimeConfig) -> Result<(Arc<dyn Llm>, Provider, String)> {
    let provider = match cfg.provider {
        Provider::Auto => detect_provider(&cfg.credentials).context(
            "no provider could be auto-detected. Set one of OPENAI_API_KEY, DEEPSEEK_API_KEY, \
             GROQ_API_KEY, or use --provider ollama",
        )?,
        p => p,
    };

    let model_name = cfg
        .model
        .clone()
        .unwrap_or_else(|| default_model_for(provider).to_string());
    validate_model_for_provider(provider, &model_name)?;
    let (base_url, api_key) = provider_endpoint(provider, &cfg.credentials)?;

    let model = OpenAiCompatibleModel::new(
        base_url,
        api_key,
        model_name.clone(),
        cfg.temperature,
        Duration::from_secs(cfg.request_timeout_secs),
    )?;
    Ok((Arc::new(model), provider, model_name))
}

/// Base URL and bearer key for a concrete provider.
pub fn provider_endpoint(
    provider: Provider,
    credentials: &ProviderCredentials,
) -> Result<(String, Option<String>)> {
    let endpoint = match provider {
        Provider::Openai => (
            credentials
                .openai_base_url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            Some(
                credentials
                    .openai_api_key
                    .clone()
                    .context("OPENAI_API_KEY is required for OpenAI provider")?,
            ),
        ),
        Provider::Deepseek => (
            "https://api.deepseek.com/v1".to_string(),
            Some(
                credentials
                    .deepseek_api_key
                    .clone()
                    .context("DEEPSEEK_API_KEY is required for DeepSeek provider")?,
            ),
        ),
        Provider::Groq => (
            "https://api.groq.com/openai/v1".to_string(),
            Some(
                credentials
                    .groq_api_key
                    .clone()
                    .context("GROQ_API_KEY is required for Groq provider")?,
            ),
        ),
        Provider::Ollama => {
            let host = credentials
                .ollama_host
                .as_deref()
                .unwrap_or("http://localhost:11434");
            (format!("{}/v1", host.trim_end_matches('/')), None)
        }
        Provider::Auto => {
            return Err(anyhow::anyhow!(
                "provider must be resolved before selecting an endpoint"
            ));
        }
    };
    Ok(endpoint)
}

pub fn detect_provider(credentials: &ProviderCredentials) -> Option<Provider> {
    if credentials.openai_api_key.is_some() {
        return Some(Provider::Openai);
    }
    if credentials.deepseek_api_key.is_some() {
        return Some(Provider::Deepseek);
    }
    if credentials.groq_api_key.is_some() {
        return Some(Provider::Groq);
    }
    if credentials.ollama_host.is_some() {
        return Some(Provider::Ollama);
    }
    None
}
