use serde::Serialize;

use crate::domain::email::{Email, Label};
use crate::mail::decoders::truncate_chars;

pub const SYSTEM_PROMPT: &str = "You are an email classifier. Your job is to analyze the subject, content, and \
sender of an email and determine whether the email is 'important' or 'unimportant'. ALWAYS provide a reason for your \
answer. Use the provided examples to guide your classification.

An email is considered 'important' if it requires timely action, is from a \
significant contact, or contains critical information. Examples include emails \
from your work, project updates, urgent requests, or important personal messages.

An email is considered 'unimportant' if it is a promotional message, a routine \
notification, or spam. Examples include advertisements, social media updates, \
newsletters, and generic greetings.

Always respond with either 'important' or 'unimportant' as the classification and the reason for \
your answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// How the backend is expected to answer; also decides how example answers are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Structured,
    FreeText,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PromptOptions {
    pub few_shot: bool,
    pub max_body_chars: Option<usize>,
}

struct Example {
    sender: &'static str,
    subject: &'static str,
    body: &'static str,
    label: Label,
    reason: &'static str,
}

const EXAMPLES: [Example; 2] = [
    Example {
        sender: "deals@shopnow.com",
        subject: "Flash sale: 40% off everything until midnight",
        body: "Don't miss out! Use code FLASH40 at checkout. Unsubscribe at any time.",
        label: Label::Unimportant,
        reason: "Promotional advertisement from a retailer with no action required.",
    },
    Example {
        sender: "manager@company.com",
        subject: "Client report due tomorrow morning",
        body: "Hi, please send me the final version of the client report by 9am tomorrow. \
               The client meeting was moved up.",
        label: Label::Important,
        reason: "Work request from a manager with a near deadline.",
    },
];

fn format_user(sender: &str, subject: &str, body: &str) -> String {
    format!(
        "Given an email with sender: {sender}, subject: {subject}, body: {body}\n\n \
         classify the email as 'important' or 'unimportant'."
    )
}

fn format_answer(label: Label, reason: &str, mode: OutputMode) -> String {
    match mode {
        OutputMode::Structured => {
            serde_json::json!({ "classification": label.as_str(), "reason": reason }).to_string()
        }
        OutputMode::FreeText => label.as_str().to_string(),
    }
}

pub fn user_message(email: &Email, options: &PromptOptions) -> String {
    let body = match options.max_body_chars {
        Some(max) => truncate_chars(&email.body, max),
        None => email.body.clone(),
    };
    format_user(&email.sender, &email.subject, &body)
}

/// System instruction, optional example exchanges, then the email itself.
pub fn build_messages(email: &Email, options: &PromptOptions, mode: OutputMode) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];
    if options.few_shot {
        for ex in &EXAMPLES {
            messages.push(ChatMessage::user(format_user(ex.sender, ex.subject, ex.body)));
            messages.push(ChatMessage::assistant(format_answer(ex.label, ex.reason, mode)));
        }
    }
    messages.push(ChatMessage::user(user_message(email, options)));
    messages
}
