//! Mail transport seam and its lettre-backed SMTP implementation.

use async_trait::async_trait;
use lettre::address::Envelope as SmtpEnvelope;
use lettre::message::header::{ContentType, HeaderName, HeaderValue};
use lettre::message::{
    Attachment as MimeAttachment, Mailbox as LettreMailbox, MultiPart, MultiPartBuilder,
    SinglePart,
};
use lettre::transport::smtp::authentication::Credentials as SmtpCredentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{Credentials, PresetTable};
use crate::email::{Attachment, DeliveryResult, Envelope, Message, Priority};
use crate::error::{Error, Result};

/// Something that can verify its connection and send a [`Message`].
///
/// A transport is configured once per batch and shared read-only by every
/// record in it.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Open a connection and check that the server answers.
    async fn verify(&self) -> Result<()>;

    /// Deliver one message.
    async fn send(&self, message: &Message) -> Result<DeliveryResult>;
}

/// SMTP transport backed by lettre.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    host: String,
    port: u16,
}

impl SmtpMailer {
    /// Configure a transport from credentials after applying provider presets.
    pub fn new(credentials: &Credentials, presets: &PresetTable) -> Result<Self> {
        let _ = rustls::crypto::ring::default_provider().install_default();

        let creds = presets.apply(credentials);
        let host = creds.host.trim().to_string();
        if host.is_empty() {
            return Err(Error::Config("SMTP host is required".to_string()));
        }

        let tls_params = TlsParameters::builder(host.clone())
            .dangerous_accept_invalid_certs(creds.allow_unauthorized_certs)
            .build()?;
        let tls = if creds.secure {
            Tls::Wrapper(tls_params)
        } else {
            Tls::Opportunistic(tls_params)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&host)
            .port(creds.port)
            .tls(tls);
        if !creds.user.is_empty() {
            builder = builder.credentials(SmtpCredentials::new(
                creds.user.clone(),
                creds.password.clone(),
            ));
        }

        info!(
            "SMTP transport configured for {}:{} (secure: {})",
            host, creds.port, creds.secure
        );

        Ok(Self {
            transport: builder.build(),
            host,
            port: creds.port,
        })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn verify(&self) -> Result<()> {
        if self.transport.test_connection().await? {
            debug!("Connection to {}:{} verified", self.host, self.port);
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "{}:{} did not accept the connection",
                self.host, self.port
            )))
        }
    }

    async fn send(&self, message: &Message) -> Result<DeliveryResult> {
        let message_id = generate_message_id(&message.from.address);
        let (email, envelope) = to_lettre(message, &message_id)?;

        let response = self.transport.send(email).await?;
        let text = response.message().collect::<Vec<_>>().join(" ");
        let accepted: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();

        debug!("Sent {message_id} to {} recipient(s)", accepted.len());

        Ok(DeliveryResult {
            message_id,
            accepted: accepted.clone(),
            rejected: Vec::new(),
            response: format!("{} {text}", response.code()).trim_end().to_string(),
            envelope: Envelope {
                from: envelope.from().map(ToString::to_string),
                to: accepted,
            },
        })
    }
}

/// `<uuid@domain>`, using the sender's domain when it has one.
fn generate_message_id(from_address: &str) -> String {
    let domain = from_address
        .rsplit_once('@')
        .map(|(_, d)| d)
        .filter(|d| !d.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{domain}>", Uuid::new_v4().simple())
}

fn parse_mailbox(raw: &str) -> Result<LettreMailbox> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("Invalid address: {raw}")))
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse()
        .map_err(|_| Error::Validation(format!("Invalid address: {raw}")))
}

fn raw_header(name: &str, value: &str) -> Result<HeaderValue> {
    let name = HeaderName::new_from_ascii(name.to_string())
        .map_err(|_| Error::Validation(format!("Invalid header name: {name}")))?;
    Ok(HeaderValue::new(name, value.to_string()))
}

const fn priority_headers(priority: Priority) -> &'static [(&'static str, &'static str)] {
    match priority {
        Priority::High => &[
            ("X-Priority", "1 (Highest)"),
            ("X-MSMail-Priority", "High"),
            ("Importance", "High"),
        ],
        Priority::Low => &[
            ("X-Priority", "5 (Lowest)"),
            ("X-MSMail-Priority", "Low"),
            ("Importance", "Low"),
        ],
        Priority::Normal => &[],
    }
}

enum Part {
    Single(SinglePart),
    Multi(MultiPart),
}

impl Part {
    fn wrap(self, builder: MultiPartBuilder) -> MultiPart {
        match self {
            Self::Single(part) => builder.singlepart(part),
            Self::Multi(part) => builder.multipart(part),
        }
    }
}

fn attachment_part(attachment: &Attachment) -> Result<SinglePart> {
    let content_type = ContentType::parse(&attachment.content_type)
        .or_else(|_| ContentType::parse("application/octet-stream"))
        .map_err(|e| Error::Validation(format!("Invalid content type: {e}")))?;
    let builder = match &attachment.cid {
        Some(cid) => {
            MimeAttachment::new_inline_with_name(cid.clone(), attachment.filename.clone())
        }
        None => MimeAttachment::new(attachment.filename.clone()),
    };
    Ok(builder.body(attachment.content.clone(), content_type))
}

/// Convert a [`Message`] into a lettre message and the envelope it is sent with.
///
/// The envelope sender is the return path when one is set, the From address
/// otherwise.
fn to_lettre(message: &Message, message_id: &str) -> Result<(lettre::Message, SmtpEnvelope)> {
    let from = LettreMailbox::new(
        message.from.name.clone(),
        parse_address(&message.from.address)?,
    );

    let mut builder = lettre::Message::builder()
        .from(from.clone())
        .subject(message.subject.clone())
        .message_id(Some(message_id.to_string()));

    let mut recipients: Vec<Address> = Vec::new();
    let mut add_recipient = |mailbox: &LettreMailbox| {
        if !recipients.contains(&mailbox.email) {
            recipients.push(mailbox.email.clone());
        }
    };
    for addr in &message.to {
        let mailbox = parse_mailbox(addr)?;
        add_recipient(&mailbox);
        builder = builder.to(mailbox);
    }
    for addr in &message.cc {
        let mailbox = parse_mailbox(addr)?;
        add_recipient(&mailbox);
        builder = builder.cc(mailbox);
    }
    for addr in &message.bcc {
        let mailbox = parse_mailbox(addr)?;
        add_recipient(&mailbox);
        builder = builder.bcc(mailbox);
    }
    if let Some(reply_to) = &message.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to)?);
    }
    if let Some(priority) = message.priority {
        for (name, value) in priority_headers(priority) {
            builder = builder.raw_header(raw_header(name, value)?);
        }
    }
    for (name, value) in &message.headers {
        builder = builder.raw_header(raw_header(name, value)?);
    }

    let sender = match &message.return_path {
        Some(path) => parse_mailbox(path)?.email,
        None => from.email,
    };
    let envelope = SmtpEnvelope::new(Some(sender), recipients)
        .map_err(|e| Error::Validation(format!("Invalid envelope: {e}")))?;
    builder = builder.envelope(envelope.clone());

    let mut content = match (message.text_body(), message.html_body()) {
        (Some(text), Some(html)) => Part::Multi(MultiPart::alternative_plain_html(
            text.to_string(),
            html.to_string(),
        )),
        (None, Some(html)) => Part::Single(SinglePart::html(html.to_string())),
        (text, None) => Part::Single(SinglePart::plain(text.unwrap_or_default().to_string())),
    };

    let (inline, regular): (Vec<&Attachment>, Vec<&Attachment>) =
        message.attachments.iter().partition(|a| a.cid.is_some());
    if !inline.is_empty() {
        let mut related = content.wrap(MultiPart::related());
        for attachment in inline {
            related = related.singlepart(attachment_part(attachment)?);
        }
        content = Part::Multi(related);
    }
    if !regular.is_empty() {
        let mut mixed = content.wrap(MultiPart::mixed());
        for attachment in regular {
            mixed = mixed.singlepart(attachment_part(attachment)?);
        }
        content = Part::Multi(mixed);
    }

    let email = match content {
        Part::Single(part) => builder.singlepart(part),
        Part::Multi(part) => builder.multipart(part),
    }
    .map_err(|e| Error::Validation(format!("Invalid message: {e}")))?;

    Ok((email, envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::email::{BodyFormat, Mailbox};

    fn message() -> Message {
        Message {
            from: Mailbox {
                address: "sender@example.com".to_string(),
                name: Some("Sender".to_string()),
            },
            to: vec!["a@example.com".to_string(), "B <b@example.com>".to_string()],
            cc: vec!["c@example.com".to_string()],
            bcc: vec!["d@example.com".to_string()],
            subject: "Hello".to_string(),
            format: BodyFormat::Both,
            text: Some("Hi".to_string()),
            html: Some("<b>Hi</b>".to_string()),
            reply_to: None,
            return_path: Some("bounce@example.com".to_string()),
            priority: Some(Priority::High),
            headers: vec![("X-Campaign".to_string(), "spring".to_string())],
            attachments: vec![Attachment {
                filename: "report.txt".to_string(),
                content: b"report".to_vec(),
                content_type: "text/plain".to_string(),
                cid: None,
            }],
        }
    }

    #[test]
    fn test_message_id_uses_sender_domain() {
        let id = generate_message_id("me@mail.example.org");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@mail.example.org>"));
        assert!(generate_message_id("nodomain").ends_with("@localhost>"));
    }

    #[test]
    fn test_envelope_uses_return_path_and_all_recipients() {
        let (_, envelope) = to_lettre(&message(), "<id@example.com>").unwrap();
        assert_eq!(
            envelope.from().map(ToString::to_string).as_deref(),
            Some("bounce@example.com")
        );
        let to: Vec<String> = envelope.to().iter().map(ToString::to_string).collect();
        assert_eq!(
            to,
            vec!["a@example.com", "b@example.com", "c@example.com", "d@example.com"]
        );
    }

    #[test]
    fn test_formatted_message_carries_custom_and_priority_headers() {
        let (email, _) = to_lettre(&message(), "<id@example.com>").unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("X-Campaign: spring"));
        assert!(raw.contains("X-Priority: 1 (Highest)"));
        assert!(raw.contains("Importance: High"));
        assert!(raw.contains("Message-ID: <id@example.com>"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("report.txt"));
        assert!(!raw.contains("d@example.com"));
    }

    #[test]
    fn test_inline_attachment_keeps_its_file_name() {
        let mut msg = message();
        msg.attachments = vec![Attachment {
            filename: "logo.png".to_string(),
            content: b"png".to_vec(),
            content_type: "image/png".to_string(),
            cid: Some("logo".to_string()),
        }];
        let (email, _) = to_lettre(&msg, "<id@example.com>").unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();
        assert!(raw.contains("multipart/related"));
        assert!(raw.contains("Content-ID: <logo>"));
        assert!(raw.contains("Content-Disposition: inline; filename=\"logo.png\""));
    }

    #[test]
    fn test_invalid_recipient_is_a_validation_error() {
        let mut msg = message();
        msg.to = vec!["not an address".to_string()];
        assert!(to_lettre(&msg, "<id@example.com>").unwrap_err().is_validation());
    }

    #[test]
    fn test_missing_host_is_a_config_error() {
        let err = SmtpMailer::new(&Credentials::default(), &PresetTable::default())
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
    }
}
