use log::{debug, info};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

use crate::auth::Session;
use crate::domain::email::{Email, MessageRef};
use crate::error::MailError;
use crate::mail::decoders::{body_text, header_value};
use crate::mail::payload::{GmailMessage, ListMessagesResponse};

/// List/get/delete over the authenticated account's messages.
pub trait Mailbox {
    fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailError>;
    fn get_message(&self, id: &str) -> Result<Email, MailError>;
    fn delete_message(&self, id: &str) -> Result<(), MailError>;
}

pub struct GmailClient {
    http: Client,
    session: Session,
    api_base: String,
    max_results: Option<u32>,
}

impl GmailClient {
    pub fn new(
        session: Session,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, MailError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailError::Transport {
                op: "client setup",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            session,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            max_results: None,
        })
    }

    pub fn with_max_results(mut self, max_results: Option<u32>) -> Self {
        self.max_results = max_results;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/users/me/messages", self.api_base)
    }

    fn send(
        &self,
        op: &'static str,
        req: reqwest::blocking::RequestBuilder,
    ) -> Result<Response, MailError> {
        let resp = req
            .bearer_auth(self.session.access_token())
            .send()
            .map_err(|e| MailError::Transport {
                op,
                reason: e.to_string(),
            })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(MailError::Transport {
                op,
                reason: format!("HTTP {status}: {}", body.trim()),
            });
        }
        Ok(resp)
    }
}

impl Mailbox for GmailClient {
    fn list_messages(&self, query: &str) -> Result<Vec<MessageRef>, MailError> {
        let mut params: Vec<(&str, String)> = vec![("q", query.to_string())];
        if let Some(n) = self.max_results {
            params.push(("maxResults", n.to_string()));
        }
        debug!("listing messages with q={query:?}");
        let resp = self.send("list", self.http.get(self.messages_url()).query(&params))?;
        let text = resp.text().map_err(|e| MailError::Transport {
            op: "list",
            reason: e.to_string(),
        })?;
        parse_list_response(&text)
    }

    fn get_message(&self, id: &str) -> Result<Email, MailError> {
        let url = format!("{}/{}", self.messages_url(), id);
        let resp = self.send("get", self.http.get(url).query(&[("format", "full")]))?;
        let text = resp.text().map_err(|e| MailError::Transport {
            op: "get",
            reason: e.to_string(),
        })?;
        parse_message(&text)
    }

    /// Permanent deletion, bypassing Trash.
    fn delete_message(&self, id: &str) -> Result<(), MailError> {
        let url = format!("{}/{}", self.messages_url(), id);
        self.send("delete", self.http.delete(url))?;
        info!("message {id} deleted");
        Ok(())
    }
}

fn parse_list_response(json: &str) -> Result<Vec<MessageRef>, MailError> {
    let list: ListMessagesResponse =
        serde_json::from_str(json).map_err(|e| MailError::InvalidResponse {
            op: "list",
            reason: e.to_string(),
        })?;
    if list.next_page_token.is_some() {
        debug!(
            "listing truncated to first page ({} of ~{})",
            list.messages.len(),
            list.result_size_estimate.unwrap_or(0)
        );
    }
    Ok(list.messages)
}

fn parse_message(json: &str) -> Result<Email, MailError> {
    let msg: GmailMessage = serde_json::from_str(json).map_err(|e| MailError::InvalidResponse {
        op: "get",
        reason: e.to_string(),
    })?;
    let payload = msg.payload.unwrap_or_default();

    let subject = header_value(&payload.headers, "Subject").ok_or_else(|| {
        MailError::MissingHeader {
            id: msg.id.clone(),
            header: "Subject",
        }
    })?;
    let sender = header_value(&payload.headers, "From").ok_or_else(|| MailError::MissingHeader {
        id: msg.id.clone(),
        header: "From",
    })?;

    Ok(Email {
        sender: sender.to_string(),
        subject: subject.to_string(),
        body: body_text(&msg.id, &payload),
        id: msg.id,
    })
}
