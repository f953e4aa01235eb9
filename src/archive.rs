//! Best-effort archival of sent emails as JSON records and EML documents.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

use crate::config::{SaveFormat, SendOptions};
use crate::email::{join_addresses, DeliveryResult, Envelope, Message, Priority};
use crate::error::{Error, Result};

/// Domain used for the Message-ID of archived EML documents.
pub const LOCAL_DOMAIN: &str = "smtp-send.local";

const CRLF: &str = "\r\n";
const MESSAGE_ID_CHARS: usize = 20;

/// Attachment metadata kept in the archive instead of the content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub filename: String,
    pub content_type: String,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerResponse {
    pub accepted: Vec<String>,
    pub rejected: Vec<String>,
    pub response: String,
    pub envelope: Envelope,
}

/// Structured record of one sent email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub timestamp: String,
    pub message_id: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bcc: Option<String>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<serde_json::Map<String, serde_json::Value>>,
    pub attachments: Vec<AttachmentSummary>,
    pub server_response: ServerResponse,
}

impl ArchiveRecord {
    #[must_use]
    pub fn new(message: &Message, delivery: &DeliveryResult, now: DateTime<Utc>) -> Self {
        let list = |l: &[String]| (!l.is_empty()).then(|| join_addresses(l));
        let headers = (!message.headers.is_empty()).then(|| {
            message
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect()
        });

        Self {
            timestamp: iso_timestamp(now),
            message_id: delivery.message_id.clone(),
            from: message.from.to_string(),
            to: join_addresses(&message.to),
            cc: list(&message.cc),
            bcc: list(&message.bcc),
            subject: message.subject.clone(),
            text: message.text.clone(),
            html: message.html.clone(),
            reply_to: message.reply_to.clone(),
            return_path: message.return_path.clone(),
            priority: message.priority,
            headers,
            attachments: message
                .attachments
                .iter()
                .map(|a| AttachmentSummary {
                    filename: a.filename.clone(),
                    content_type: a.content_type.clone(),
                    size: a.content.len(),
                    cid: a.cid.clone(),
                })
                .collect(),
            server_response: ServerResponse {
                accepted: delivery.accepted.clone(),
                rejected: delivery.rejected.clone(),
                response: delivery.response.clone(),
                envelope: delivery.envelope.clone(),
            },
        }
    }
}

/// Writes archive files for sent emails into one directory.
#[derive(Debug, Clone)]
pub struct ArchiveWriter {
    save_path: PathBuf,
    format: SaveFormat,
}

impl ArchiveWriter {
    #[must_use]
    pub fn new(save_path: impl Into<PathBuf>, format: SaveFormat) -> Self {
        Self {
            save_path: save_path.into(),
            format,
        }
    }

    #[must_use]
    pub fn from_options(options: &SendOptions) -> Self {
        Self::new(options.save_path.clone(), options.save_format)
    }

    #[must_use]
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Write the configured renderings and return the paths written.
    ///
    /// Fails with [`Error::Directory`] when the save directory cannot be
    /// created and [`Error::Write`] when a file cannot be written.
    pub async fn persist(
        &self,
        message: &Message,
        delivery: &DeliveryResult,
    ) -> Result<Vec<PathBuf>> {
        self.persist_at(Utc::now(), message, delivery).await
    }

    async fn persist_at(
        &self,
        now: DateTime<Utc>,
        message: &Message,
        delivery: &DeliveryResult,
    ) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.save_path)
            .await
            .map_err(|_| Error::Directory(self.save_path.clone()))?;

        let base = base_file_name(now, &delivery.message_id);
        let mut written = Vec::new();

        if self.format.writes_json() {
            let record = ArchiveRecord::new(message, delivery, now);
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| Error::Write(e.to_string()))?;
            let path = self.save_path.join(format!("{base}.json"));
            write_file(&path, json).await?;
            written.push(path);
        }

        if self.format.writes_eml() {
            let path = self.save_path.join(format!("{base}.eml"));
            write_file(&path, render_eml(message, now)).await?;
            written.push(path);
        }

        debug!("Archived {} to {}", delivery.message_id, self.save_path.display());
        Ok(written)
    }
}

async fn write_file(path: &Path, contents: String) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| Error::Write(format!("{}: {e}", path.display())))
}

/// ISO-8601 UTC timestamp with millisecond precision.
#[must_use]
pub fn iso_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `<timestamp>_<message id>` with `:`/`.` turned into `-` and the message id
/// stripped of `<`, `>`, `@` and cut to 20 characters.
#[must_use]
pub fn base_file_name(now: DateTime<Utc>, message_id: &str) -> String {
    let timestamp = iso_timestamp(now).replace([':', '.'], "-");
    let id: String = message_id
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '@'))
        .take(MESSAGE_ID_CHARS)
        .collect();
    format!("{timestamp}_{id}")
}

/// Render `message` as an EML document with CRLF line endings.
#[must_use]
pub fn render_eml(message: &Message, now: DateTime<Utc>) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("From: {}", message.from));
    lines.push(format!("To: {}", join_addresses(&message.to)));
    if !message.cc.is_empty() {
        lines.push(format!("Cc: {}", join_addresses(&message.cc)));
    }
    if !message.bcc.is_empty() {
        lines.push(format!("Bcc: {}", join_addresses(&message.bcc)));
    }
    lines.push(format!("Subject: {}", message.subject));
    lines.push(format!("Date: {}", now.format("%a, %d %b %Y %H:%M:%S GMT")));
    lines.push(format!(
        "Message-ID: <{}@{LOCAL_DOMAIN}>",
        now.timestamp_millis()
    ));
    if let Some(reply_to) = &message.reply_to {
        lines.push(format!("Reply-To: {reply_to}"));
    }
    if let Some(return_path) = &message.return_path {
        lines.push(format!("Return-Path: {return_path}"));
    }
    for (name, value) in &message.headers {
        lines.push(format!("{name}: {value}"));
    }
    lines.push("MIME-Version: 1.0".to_string());

    match (message.text_body(), message.html_body()) {
        (Some(text), Some(html)) => {
            let boundary = boundary(now);
            lines.push(format!(
                "Content-Type: multipart/alternative; boundary=\"{boundary}\""
            ));
            lines.push(String::new());
            push_part(&mut lines, Some(&boundary), "text/plain", text);
            lines.push(String::new());
            push_part(&mut lines, Some(&boundary), "text/html", html);
            lines.push(String::new());
            lines.push(format!("--{boundary}--"));
        }
        (None, Some(html)) => push_part(&mut lines, None, "text/html", html),
        (text, None) => push_part(&mut lines, None, "text/plain", text.unwrap_or_default()),
    }

    lines.join(CRLF)
}

fn push_part(lines: &mut Vec<String>, boundary: Option<&str>, mime: &str, body: &str) {
    if let Some(boundary) = boundary {
        lines.push(format!("--{boundary}"));
    }
    lines.push(format!("Content-Type: {mime}; charset=UTF-8"));
    lines.push("Content-Transfer-Encoding: 8bit".to_string());
    lines.push(String::new());
    lines.push(body.to_string());
}

fn boundary(now: DateTime<Utc>) -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("boundary_{}_{}", now.timestamp_millis(), &random[..9])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SendFields;
    use crate::record::Record;
    use chrono::TimeZone;

    fn sent() -> (Message, DeliveryResult) {
        let fields = SendFields {
            from_email: "sender@example.com".to_string(),
            to_email: "alice@example.com".to_string(),
            subject: "Archived".to_string(),
            html: "<p>hi</p>".to_string(),
            ..Default::default()
        };
        let message = crate::builder::build(&Record::default(), &fields).unwrap();
        let delivery = DeliveryResult {
            message_id: "<archived-1@example.com>".to_string(),
            accepted: vec!["alice@example.com".to_string()],
            rejected: Vec::new(),
            response: "250 OK".to_string(),
            envelope: Envelope {
                from: Some("sender@example.com".to_string()),
                to: vec!["alice@example.com".to_string()],
            },
        };
        (message, delivery)
    }

    #[tokio::test]
    async fn test_unwritable_file_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let (message, delivery) = sent();

        let taken = dir
            .path()
            .join(format!("{}.json", base_file_name(now, &delivery.message_id)));
        std::fs::create_dir(&taken).unwrap();

        let writer = ArchiveWriter::new(dir.path(), SaveFormat::Json);
        let err = writer.persist_at(now, &message, &delivery).await.unwrap_err();
        assert!(matches!(err, Error::Write(_)), "{err}");
        assert!(err.to_string().starts_with("error while saving email"));
    }

    #[tokio::test]
    async fn test_persist_at_writes_both_renderings() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let (message, delivery) = sent();

        let writer = ArchiveWriter::new(dir.path(), SaveFormat::Both);
        let written = writer.persist_at(now, &message, &delivery).await.unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "2024-03-09T14-05-07-000Z_archived-1example.co.json",
                "2024-03-09T14-05-07-000Z_archived-1example.co.eml",
            ]
        );
    }

    #[test]
    fn test_base_file_name_is_sanitized() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let name = base_file_name(now, "<0123456789abcdefghijkl@example.com>");
        assert_eq!(name, "2024-03-09T14-05-07-000Z_0123456789abcdefghij");
    }

    #[test]
    fn test_short_message_id_is_kept_whole() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(base_file_name(now, "<a@b>"), "2024-01-01T00-00-00-000Z_ab");
    }

    #[test]
    fn test_boundary_shape() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = boundary(now);
        let suffix = b
            .strip_prefix(&format!("boundary_{}_", now.timestamp_millis()))
            .unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
