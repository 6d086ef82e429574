//! Error types shared across the crate.

/// Could not obtain a valid mailbox session. Fatal for the run.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("OAuth configuration error: {0}")]
    Config(String),

    #[error("Interactive authorization failed: {0}")]
    Flow(String),

    #[error("Token request failed: {0}")]
    TokenRequest(String),

    #[error("Credential store error: {0}")]
    Store(String),
}

/// Failures of the mailbox adapter. All are per-call and never abort a run.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Transport error during {op}: {reason}")]
    Transport { op: &'static str, reason: String },

    #[error("Message {id} has no {header} header")]
    MissingHeader { id: String, header: &'static str },

    #[error("Unexpected response during {op}: {reason}")]
    InvalidResponse { op: &'static str, reason: String },
}

/// Body of a message part could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("part has no encoded body data")]
    MissingData,

    #[error("invalid base64url body: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// LLM backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Missing API key for {provider}: set {env_var}")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

/// Classification of a single email failed.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Structured output did not match the classification schema: {0}")]
    StructuredOutput(String),
}
