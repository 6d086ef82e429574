//! Chat-completion backends.
//!
//! - **OpenAI**: chat completions with a forced `classify_email` tool call (structured)
//! - **Ollama**: `/api/chat` with a JSON-schema `format` (structured)
//! - **Ollama text**: `/api/chat` returning plain text (free-text)

use log::{debug, info};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use crate::classifier::interpret::SCHEMA_DESCRIPTION;
use crate::classifier::prompt::{ChatMessage, OutputMode};
use crate::config::{BackendKind, LlmConfig};
use crate::error::LlmError;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
const CLASSIFY_TOOL: &str = "classify_email";

/// A model that turns a chat exchange into raw output text.
pub trait ChatBackend {
    fn name(&self) -> &str;

    fn output_mode(&self) -> OutputMode;

    /// With `schema`, structured backends return the JSON object they were constrained to.
    fn complete(&self, messages: &[ChatMessage], schema: Option<&Value>)
    -> Result<String, LlmError>;
}

fn http_client(provider: &str, timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("failed to build HTTP client: {e}"),
        })
}

fn post_json<B: Serialize>(
    http: &Client,
    provider: &str,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<String, LlmError> {
    let mut req = http.post(url).json(body);
    if let Some(key) = api_key {
        req = req.bearer_auth(key);
    }
    let resp = req.send().map_err(|e| LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: e.to_string(),
    })?;
    let status = resp.status();
    let text = resp.text().map_err(|e| LlmError::RequestFailed {
        provider: provider.to_string(),
        reason: format!("reading body: {e}"),
    })?;
    if !status.is_success() {
        return Err(LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {status}: {}", text.trim()),
        });
    }
    Ok(text)
}

// --- OpenAI ---

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
    refusal: Option<String>,
}

#[derive(Deserialize)]
struct ToolCall {
    function: FunctionCall,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    arguments: String,
}

pub struct OpenAiBackend {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client("openai", Duration::from_secs(config.timeout_secs))?,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            api_key,
            model: config.resolved_model(),
            temperature: config.temperature,
        })
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        schema: Option<&Value>,
    ) -> OpenAiRequest<'a> {
        let (tools, tool_choice) = match schema {
            Some(schema) => (
                Some(json!([{
                    "type": "function",
                    "function": {
                        "name": CLASSIFY_TOOL,
                        "description": SCHEMA_DESCRIPTION,
                        "parameters": schema,
                    }
                }])),
                Some(json!({"type": "function", "function": {"name": CLASSIFY_TOOL}})),
            ),
            None => (None, None),
        };
        OpenAiRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools,
            tool_choice,
        }
    }
}

fn parse_openai_response(text: &str, structured: bool) -> Result<String, LlmError> {
    let invalid = |reason: String| LlmError::InvalidResponse {
        provider: "openai".into(),
        reason,
    };
    let resp: OpenAiResponse =
        serde_json::from_str(text).map_err(|e| invalid(format!("parse error: {e}")))?;
    let message = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid("no choices".into()))?
        .message;

    if let Some(refusal) = message.refusal {
        return Err(invalid(format!("model refused: {refusal}")));
    }
    if !structured {
        return message
            .content
            .ok_or_else(|| invalid("message has no content".into()));
    }
    message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .find(|c| c.function.name == CLASSIFY_TOOL)
        .map(|c| c.function.arguments)
        .ok_or_else(|| invalid(format!("no {CLASSIFY_TOOL} tool call in response")))
}

impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn output_mode(&self) -> OutputMode {
        OutputMode::Structured
    }

    fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(messages, schema);
        let text = post_json(&self.http, "openai", &url, Some(&self.api_key), &body)?;
        parse_openai_response(&text, schema.is_some())
    }
}

// --- Ollama ---

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

/// Local Ollama server. `structured` selects schema-constrained output.
pub struct OllamaBackend {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
    structured: bool,
}

impl OllamaBackend {
    pub fn new(config: &LlmConfig, structured: bool) -> Result<Self, LlmError> {
        Ok(Self {
            http: http_client("ollama", Duration::from_secs(config.timeout_secs))?,
            base_url: config.resolved_base_url().trim_end_matches('/').to_string(),
            model: config.resolved_model(),
            temperature: config.temperature,
            structured,
        })
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        schema: Option<&'a Value>,
    ) -> OllamaRequest<'a> {
        OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
            format: if self.structured { schema } else { None },
            options: OllamaOptions {
                temperature: self.temperature,
            },
        }
    }
}

fn parse_ollama_response(text: &str) -> Result<String, LlmError> {
    let resp: OllamaResponse =
        serde_json::from_str(text).map_err(|e| LlmError::InvalidResponse {
            provider: "ollama".into(),
            reason: format!("parse error: {e}"),
        })?;
    Ok(resp.message.content)
}

impl ChatBackend for OllamaBackend {
    fn name(&self) -> &str {
        if self.structured { "ollama" } else { "ollama-text" }
    }

    fn output_mode(&self) -> OutputMode {
        if self.structured {
            OutputMode::Structured
        } else {
            OutputMode::FreeText
        }
    }

    fn complete(
        &self,
        messages: &[ChatMessage],
        schema: Option<&Value>,
    ) -> Result<String, LlmError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.request_body(messages, schema);
        debug!("ollama request to {url} (model {})", self.model);
        let text = post_json(&self.http, self.name(), &url, None, &body)?;
        parse_ollama_response(&text)
    }
}

/// Create the configured backend.
pub fn create_backend(config: &LlmConfig) -> Result<Box<dyn ChatBackend>, LlmError> {
    let backend: Box<dyn ChatBackend> = match config.backend {
        BackendKind::OpenAi => {
            let api_key = std::env::var(OPENAI_API_KEY_ENV)
                .ok()
                .filter(|k| !k.is_empty())
                .ok_or(LlmError::MissingApiKey {
                    provider: "openai",
                    env_var: OPENAI_API_KEY_ENV,
                })?;
            Box::new(OpenAiBackend::new(config, api_key)?)
        }
        BackendKind::Ollama => Box::new(OllamaBackend::new(config, true)?),
        BackendKind::OllamaText => Box::new(OllamaBackend::new(config, false)?),
    };
    info!("Using {} (model: {})", backend.name(), config.resolved_model());
    Ok(backend)
}
