//! Validation and assembly of a [`Message`] from record fields.

use crate::config::{AttachmentSlot, HeaderPair, SendFields};
use crate::email::{split_addresses, Attachment, BodyFormat, Mailbox, Message, Priority};
use crate::error::{Error, Result};
use crate::record::Record;
use base64::prelude::*;

/// Build a message for `record` from its resolved fields.
///
/// Fails with [`Error::Validation`] when from, to or subject is blank (a to
/// list holding only separators counts as blank), when
/// the selected format requires a body that is empty, or when an attachment
/// slot has no property name. Slots naming a binary property the record does
/// not carry are skipped.
pub fn build(record: &Record, fields: &SendFields) -> Result<Message> {
    let from_email = required(&fields.from_email, "From Email is required")?;
    let to_email = required(&fields.to_email, "To Email is required")?;
    let subject = required(&fields.subject, "Subject is required")?;

    let from_name = fields.from_name.trim();
    let from = Mailbox {
        address: from_email.to_string(),
        name: (!from_name.is_empty()).then(|| from_name.to_string()),
    };

    let format = fields.email_format;
    let text = if format.wants_text() {
        if fields.text.is_empty() && format == BodyFormat::Text {
            return Err(Error::Validation(
                "Text content is required for the \"Plain Text\" format".to_string(),
            ));
        }
        Some(fields.text.clone())
    } else {
        None
    };
    let html = if format.wants_html() {
        if fields.html.is_empty() && format == BodyFormat::Html {
            return Err(Error::Validation(
                "HTML content is required for the \"HTML\" format".to_string(),
            ));
        }
        Some(fields.html.clone())
    } else {
        None
    };

    let to = split_addresses(to_email);
    if to.is_empty() {
        return Err(Error::Validation("To Email is required".to_string()));
    }

    let options = &fields.options;

    Ok(Message {
        from,
        to,
        cc: split_addresses(&fields.cc_email),
        bcc: split_addresses(&fields.bcc_email),
        subject: subject.to_string(),
        format,
        text,
        html,
        reply_to: optional(&options.reply_to),
        return_path: optional(&options.return_path),
        priority: (options.priority != Priority::Normal).then_some(options.priority),
        headers: fold_headers(&options.custom_headers),
        attachments: resolve_attachments(record, &fields.attachments)?,
    })
}

fn required<'a>(value: &'a str, msg: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(msg.to_string()));
    }
    Ok(value)
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Later pairs with an existing name overwrite the value in place.
fn fold_headers(pairs: &[HeaderPair]) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = Vec::new();
    for pair in pairs {
        if pair.name.is_empty() || pair.value.is_empty() {
            continue;
        }
        match headers.iter_mut().find(|(name, _)| *name == pair.name) {
            Some((_, value)) => value.clone_from(&pair.value),
            None => headers.push((pair.name.clone(), pair.value.clone())),
        }
    }
    headers
}

fn resolve_attachments(record: &Record, slots: &[AttachmentSlot]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::with_capacity(slots.len());
    for slot in slots {
        if slot.property.is_empty() {
            return Err(Error::Validation(
                "Property Name is required for attachments".to_string(),
            ));
        }
        let Some(binary) = record.binary.get(&slot.property) else {
            tracing::debug!("No binary property {} on record, skipping attachment", slot.property);
            continue;
        };
        let content = BASE64_STANDARD.decode(binary.data.trim()).map_err(|e| {
            Error::Validation(format!(
                "attachment property {} is not valid base64: {e}",
                slot.property
            ))
        })?;
        let filename = if slot.name.is_empty() {
            slot.property.clone()
        } else {
            slot.name.clone()
        };
        attachments.push(Attachment {
            filename,
            content,
            content_type: binary.mime_type.clone(),
            cid: optional(&slot.cid),
        });
    }
    Ok(attachments)
}
