//! Mapping raw model output to a [`ClassificationResult`].
//!
//! Structured output must carry both schema fields with a valid label. Free text is
//! scanned for the standalone words `unimportant` and then `important`; the first hit in
//! that order wins, since "unimportant" contains "important".

use regex::Regex;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::LazyLock;

use crate::domain::email::{ClassificationResult, Label};
use crate::error::ClassifyError;

static UNIMPORTANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bunimportant\b").expect("valid regex"));
static IMPORTANT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bimportant\b").expect("valid regex"));

/// The two labels a structured answer may carry; `unknown` is never valid output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Verdict {
    Important,
    Unimportant,
}

#[derive(Debug, Deserialize)]
struct StructuredVerdict {
    classification: Verdict,
    reason: String,
}

pub const SCHEMA_DESCRIPTION: &str =
    "Classifies emails as 'important' or 'unimportant' and provides a reason for the classification.";

/// JSON schema requested from structured-output backends.
pub fn classification_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "classification": {
                "type": "string",
                "enum": ["important", "unimportant"],
                "description": "The classification of the email. Either 'important' or 'unimportant'."
            },
            "reason": {
                "type": "string",
                "description": "The reason for the classification of the email."
            }
        },
        "required": ["classification", "reason"],
        "additionalProperties": false
    })
}

pub fn parse_structured(raw: &str) -> Result<ClassificationResult, ClassifyError> {
    let verdict: StructuredVerdict = serde_json::from_str(raw.trim())
        .map_err(|e| ClassifyError::StructuredOutput(format!("{e}; raw output: {raw}")))?;
    let label = match verdict.classification {
        Verdict::Important => Label::Important,
        Verdict::Unimportant => Label::Unimportant,
    };
    Ok(ClassificationResult {
        label,
        reason: Some(verdict.reason),
    })
}

pub fn parse_free_text(raw: &str) -> Label {
    let text = raw.to_lowercase();
    if UNIMPORTANT_RE.is_match(&text) {
        Label::Unimportant
    } else if IMPORTANT_RE.is_match(&text) {
        Label::Important
    } else {
        Label::Unknown
    }
}
