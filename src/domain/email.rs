use serde::{Deserialize, Serialize};
use std::fmt;

/// Gmail message identifier (opaque hex string).
pub type EmailId = String;

/// Entry returned by the listing call; details are fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: EmailId,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: EmailId,
    pub sender: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Important,
    Unimportant,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Important => "important",
            Label::Unimportant => "unimportant",
            Label::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub label: Label,
    pub reason: Option<String>,
}

impl ClassificationResult {
    pub fn unknown() -> Self {
        Self {
            label: Label::Unknown,
            reason: None,
        }
    }
}

/// One line of run output.
#[derive(Debug, Serialize)]
pub struct SummaryRecord<'a> {
    pub classification: Label,
    pub reason: Option<&'a str>,
    pub subject: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_record_serializes_lowercase_label() {
        let rec = SummaryRecord {
            classification: Label::Unimportant,
            reason: Some("newsletter"),
            subject: "Weekly digest",
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["classification"], "unimportant");
        assert_eq!(json["reason"], "newsletter");
        assert_eq!(json["subject"], "Weekly digest");
    }

    #[test]
    fn unknown_result_has_no_reason() {
        let r = ClassificationResult::unknown();
        assert_eq!(r.label, Label::Unknown);
        assert!(r.reason.is_none());
        assert_eq!(r.label.to_string(), "unknown");
    }
}
