use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";
pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";
pub const DEFAULT_MAX_AGE_DAYS: u32 = 90;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secrets_file: Option<String>,
    pub redirect_uri: Option<String>,
    pub token_path: Option<String>,
    #[serde(default)]
    pub query: String,
    pub max_age_days: Option<u32>,
    pub max_results: Option<u32>,
    #[serde(default)]
    pub delete_unimportant: bool,
    #[serde(default)]
    pub few_shot: bool,
    pub max_body_chars: Option<usize>,
    pub gmail_api_base: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[default]
    #[serde(rename = "ollama")]
    Ollama,
    #[serde(rename = "ollama-text")]
    OllamaText,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default)]
    pub backend: BackendKind,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            model: None,
            base_url: None,
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn resolved_model(&self) -> String {
        self.model.clone().unwrap_or_else(|| match self.backend {
            BackendKind::OpenAi => "gpt-4o".to_string(),
            BackendKind::Ollama | BackendKind::OllamaText => "llama3".to_string(),
        })
    }

    pub fn resolved_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| match self.backend {
            BackendKind::OpenAi => "https://api.openai.com/v1".to_string(),
            BackendKind::Ollama | BackendKind::OllamaText => "http://localhost:11434".to_string(),
        })
    }
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn redirect_uri(&self) -> String {
        self.redirect_uri
            .clone()
            .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string())
    }

    pub fn max_age_days(&self) -> u32 {
        self.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS)
    }

    pub fn gmail_api_base(&self) -> String {
        self.gmail_api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_GMAIL_API_BASE.to_string())
    }
}

fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or_else(|| anyhow::anyhow!("no config dir available"))?
        .join("rs_mail_classifier"))
}

pub fn config_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("config.toml");
    Ok(p)
}

pub fn default_token_path() -> Result<PathBuf> {
    let mut p = config_dir()?;
    fs::create_dir_all(&p)?;
    p.push("token.json");
    Ok(p)
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        // create a template config for users to edit
        let sample = Config {
            client_id: Some("YOUR_CLIENT_ID.apps.googleusercontent.com".to_string()),
            redirect_uri: Some(DEFAULT_REDIRECT_URI.to_string()),
            max_age_days: Some(DEFAULT_MAX_AGE_DAYS),
            ..Config::default()
        };
        let tom = toml::to_string_pretty(&sample)?;
        fs::write(path, tom)?;
        return Err(anyhow::anyhow!(
            "Created template config at {}, edit it and run again",
            path.display()
        ));
    }
    let s = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Config::from_toml_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

pub fn resolve_token_path(cfg: &Config) -> Result<PathBuf> {
    if let Some(p) = &cfg.token_path {
        Ok(PathBuf::from(p))
    } else {
        default_token_path()
    }
}
