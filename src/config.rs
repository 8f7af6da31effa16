use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::*;

pub const DEFAULT_OUTPUT_FOLDER: &str = "./generated_crews";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub profile: String,
    pub config_path: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub temperature: f32,
    pub output_folder: String,
    pub search_enabled: bool,
    pub request_timeout_secs: u64,
    pub show_sensitive_config: bool,
    pub telemetry_enabled: bool,
    pub telemetry_path: String,
    pub credentials: ProviderCredentials,
}

/// Backend credentials and endpoints, captured once after `.env` is loaded.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub deepseek_api_key: Option<String>,
    pub groq_api_key: Option<String>,
    pub ollama_host: Option<String>,
}

impl ProviderCredentials {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            deepseek_api_key: get("DEEPSEEK_API_KEY"),
            groq_api_key: get("GROQ_API_KEY"),
            ollama_host: get("OLLAMA_HOST"),
        }
    }

    pub fn presence(&self) -> [(&'static str, bool); 4] {
        [
            ("OPENAI_API_KEY", self.openai_api_key.is_some()),
            ("DEEPSEEK_API_KEY", self.deepseek_api_key.is_some()),
            ("GROQ_API_KEY", self.groq_api_key.is_some()),
            ("OLLAMA_HOST", self.ollama_host.is_some()),
        ]
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secret = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderCredentials")
            .field("openai_api_key", &secret(&self.openai_api_key))
            .field("openai_base_url", &self.openai_base_url)
            .field("deepseek_api_key", &secret(&self.deepseek_api_key))
            .field("groq_api_key", &secret(&self.groq_api_key))
            .field("ollama_host", &self.ollama_host)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfilesFile {
    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<Provider>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub output_folder: Option<String>,
    pub search_enabled: Option<bool>,
    pub request_timeout_secs: Option<u64>,
    pub telemetry_enabled: Option<bool>,
    pub telemetry_path: Option<String>,
}

/// Loads `.env` from the working directory (or a parent) into the process
/// environment. A missing file is not an error.
pub fn load_env_file() -> Option<PathBuf> {
    match dotenvy::dotenv() {
        Ok(path) => Some(path),
        Err(err) if err.not_found() => None,
        Err(err) => {
            // Logging is not initialized yet; the CLI reports this once tracing is up.
            eprintln!("warning: ignoring unreadable .env file: {err}");
            None
        }
    }
}

pub fn load_profiles(config_path: &str) -> Result<ProfilesFile> {
    let path = Path::new(config_path);
    if !path.exists() {
        return Ok(ProfilesFile::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read profile config file at '{}'", path.display()))?;
    parse_profiles(&content).with_context(|| {
        format!(
            "invalid profile configuration in '{}'. Check provider values and field names.",
            path.display()
        )
    })
}

pub fn parse_profiles(content: &str) -> Result<ProfilesFile> {
    Ok(toml::from_str::<ProfilesFile>(content)?)
}

pub fn resolve_runtime_config(
    cli: &Cli,
    profiles: &ProfilesFile,
    credentials: ProviderCredentials,
) -> Result<RuntimeConfig> {
    let selected = cli.profile.trim();
    if selected.is_empty() {
        return Err(anyhow::anyhow!(
            "profile name cannot be empty. Set --profile <name>."
        ));
    }

    let profile = if selected == "default" && !profiles.profiles.contains_key("default") {
        ProfileConfig::default()
    } else {
        profiles.profiles.get(selected).cloned().ok_or_else(|| {
            let mut names = profiles.profiles.keys().cloned().collect::<Vec<String>>();
            names.sort();
            if names.is_empty() {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. No profiles are defined yet.",
                    selected,
                    cli.config_path
                )
            } else {
                anyhow::anyhow!(
                    "profile '{}' not found in '{}'. Available profiles: {}",
                    selected,
                    cli.config_path,
                    names.join(", ")
                )
            }
        })?
    };

    let provider = if cli.provider != Provider::Auto {
        cli.provider
    } else {
        profile.provider.unwrap_or(Provider::Auto)
    };

    let temperature = cli
        .temperature
        .or(profile.temperature)
        .unwrap_or(DEFAULT_TEMPERATURE);
    if !(0.0..=2.0).contains(&temperature) {
        return Err(anyhow::anyhow!(
            "invalid value for temperature: {temperature}. Expected a value between 0.0 and 2.0."
        ));
    }

    let output_folder = cli
        .output_folder
        .clone()
        .or(profile.output_folder)
        .unwrap_or_else(|| DEFAULT_OUTPUT_FOLDER.to_string());
    if output_folder.trim().is_empty() {
        return Err(anyhow::anyhow!("invalid value for output folder: path is empty"));
    }

    Ok(RuntimeConfig {
        profile: selected.to_string(),
        config_path: cli.config_path.clone(),
        provider,
        model: cli.model.clone().or(profile.model),
        temperature,
        output_folder,
        search_enabled: cli
            .search_enabled
            .or(profile.search_enabled)
            .unwrap_or(true),
        request_timeout_secs: cli
            .request_timeout_secs
            .or(profile.request_timeout_secs)
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
            .max(1),
        show_sensitive_config: cli.show_sensitive_config,
        telemetry_enabled: cli
            .telemetry_enabled
            .or(profile.telemetry_enabled)
            .unwrap_or(false),
        telemetry_path: cli
            .telemetry_path
            .clone()
            .or(profile.telemetry_path)
            .unwrap_or_else(|| ".crewforge/telemetry/events.jsonl".to_string()),
        credentials,
    })
}
