//! Message model shared by the builder, the transports and the archive.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sender address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailbox {
    pub address: String,
    pub name: Option<String>,
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "\"{name}\" <{}>", self.address),
            None => f.write_str(&self.address),
        }
    }
}

/// Which body variants a message carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    Text,
    #[default]
    Html,
    Both,
}

impl BodyFormat {
    #[must_use]
    pub const fn wants_text(self) -> bool {
        matches!(self, Self::Text | Self::Both)
    }

    #[must_use]
    pub const fn wants_html(self) -> bool {
        matches!(self, Self::Html | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// A resolved attachment. Content is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
    pub cid: Option<String>,
}

/// Canonical in-memory email, independent of any transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub from: Mailbox,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub format: BodyFormat,
    pub text: Option<String>,
    pub html: Option<String>,
    pub reply_to: Option<String>,
    pub return_path: Option<String>,
    /// `None` when the priority is normal.
    pub priority: Option<Priority>,
    /// Custom headers in insertion order, names unique.
    pub headers: Vec<(String, String)>,
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// All envelope recipients: to, then cc, then bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(String::as_str)
    }

    /// Text body, if present and non-empty.
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        self.text.as_deref().filter(|s| !s.is_empty())
    }

    /// HTML body, if present and non-empty.
    #[must_use]
    pub fn html_body(&self) -> Option<&str> {
        self.html.as_deref().filter(|s| !s.is_empty())
    }
}

/// Join an address list into its comma-delimited wire form.
#[must_use]
pub fn join_addresses(list: &[String]) -> String {
    list.join(", ")
}

/// Split a comma-delimited address list. Commas inside double quotes do not
/// split, empty entries are dropped and duplicates keep their first position.
#[must_use]
pub fn split_addresses(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    let push = |entry: &str, out: &mut Vec<String>| {
        let entry = entry.trim();
        if !entry.is_empty() && !out.iter().any(|e| e == entry) {
            out.push(entry.to_string());
        }
    };

    for c in raw.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => {
                push(&current, &mut out);
                current.clear();
            }
            _ => current.push(c),
        }
    }
    push(&current, &mut out);
    out
}

/// SMTP envelope as seen by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Option<String>,
    pub to: Vec<String>,
}

/// What the transport reports after a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub message_id: String,
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
    pub envelope: Envelope,
}
