//! Credentials, per-record send fields and provider presets.

use crate::email::{BodyFormat, Priority};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SAVE_PATH: &str = "/tmp/sent_emails";

/// SMTP account settings used to configure a transport.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    /// Implicit TLS from the first byte; otherwise STARTTLS when offered.
    pub secure: bool,
    pub user: String,
    pub password: String,
    pub allow_unauthorized_certs: bool,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 465,
            secure: true,
            user: String::new(),
            password: String::new(),
            allow_unauthorized_certs: false,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("allow_unauthorized_certs", &self.allow_unauthorized_certs)
            .finish()
    }
}

impl Credentials {
    /// Load credentials from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        read_json(path.as_ref())
    }
}

/// Host preset applied when the configured host contains `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPreset {
    pub pattern: String,
    pub service: String,
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

impl ProviderPreset {
    fn new(pattern: &str, service: &str, host: &str, port: u16, secure: bool) -> Self {
        Self {
            pattern: pattern.to_string(),
            service: service.to_string(),
            host: host.to_string(),
            port,
            secure,
        }
    }
}

/// Ordered preset table; the first matching pattern wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetTable {
    presets: Vec<ProviderPreset>,
}

impl Default for PresetTable {
    fn default() -> Self {
        Self {
            presets: vec![
                ProviderPreset::new("gmail", "gmail", "smtp.gmail.com", 465, true),
                ProviderPreset::new("outlook", "hotmail", "smtp-mail.outlook.com", 587, false),
                ProviderPreset::new("hotmail", "hotmail", "smtp-mail.outlook.com", 587, false),
            ],
        }
    }
}

impl PresetTable {
    /// A table holding only the given presets.
    #[must_use]
    pub const fn new(presets: Vec<ProviderPreset>) -> Self {
        Self { presets }
    }

    /// Insert presets ahead of the existing ones.
    #[must_use]
    pub fn with_overrides(mut self, mut presets: Vec<ProviderPreset>) -> Self {
        presets.append(&mut self.presets);
        self.presets = presets;
        self
    }

    /// Read a JSON array of presets.
    pub fn load_overrides(path: impl AsRef<Path>) -> Result<Vec<ProviderPreset>> {
        read_json(path.as_ref())
    }

    /// Find the preset whose pattern occurs in `host`, case-insensitively.
    #[must_use]
    pub fn find(&self, host: &str) -> Option<&ProviderPreset> {
        let host = host.to_lowercase();
        self.presets
            .iter()
            .find(|p| !p.pattern.is_empty() && host.contains(&p.pattern.to_lowercase()))
    }

    /// Credentials with host, port and TLS mode taken from the matching preset.
    #[must_use]
    pub fn apply(&self, credentials: &Credentials) -> Credentials {
        let mut resolved = credentials.clone();
        if let Some(preset) = self.find(&credentials.host) {
            tracing::debug!(
                "Host {} matches preset {}, using {}:{}",
                credentials.host,
                preset.service,
                preset.host,
                preset.port
            );
            resolved.host.clone_from(&preset.host);
            resolved.port = preset.port;
            resolved.secure = preset.secure;
        }
        resolved
    }
}

/// How a sent email is archived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveFormat {
    #[default]
    Json,
    Eml,
    Both,
}

impl SaveFormat {
    #[must_use]
    pub const fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    #[must_use]
    pub const fn writes_eml(self) -> bool {
        matches!(self, Self::Eml | Self::Both)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderPair {
    pub name: String,
    pub value: String,
}

/// One declared attachment, resolved against the record's binary data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentSlot {
    /// Name of the binary property holding the data.
    pub property: String,
    /// File name; the property name is used when empty.
    pub name: String,
    /// Content-ID for inline images.
    pub cid: String,
}

impl Default for AttachmentSlot {
    fn default() -> Self {
        Self {
            property: "data".to_string(),
            name: String::new(),
            cid: String::new(),
        }
    }
}

/// Optional per-record settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendOptions {
    pub custom_headers: Vec<HeaderPair>,
    pub priority: Priority,
    pub reply_to: String,
    pub return_path: String,
    pub save_sent_email: bool,
    pub save_format: SaveFormat,
    pub save_path: PathBuf,
    /// Seconds; zero falls back to the default.
    pub timeout: u64,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            custom_headers: Vec::new(),
            priority: Priority::Normal,
            reply_to: String::new(),
            return_path: String::new(),
            save_sent_email: false,
            save_format: SaveFormat::Json,
            save_path: PathBuf::from(DEFAULT_SAVE_PATH),
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl SendOptions {
    #[must_use]
    pub const fn timeout_secs(&self) -> u64 {
        if self.timeout == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            self.timeout
        }
    }
}

/// Per-record parameters for one email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SendFields {
    pub from_email: String,
    pub from_name: String,
    /// Comma-separated recipients.
    pub to_email: String,
    pub cc_email: String,
    pub bcc_email: String,
    pub subject: String,
    pub email_format: BodyFormat,
    pub text: String,
    pub html: String,
    pub attachments: Vec<AttachmentSlot>,
    pub options: SendOptions,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&data)
        .map_err(|e| Error::Config(format!("invalid JSON in {}: {e}", path.display())))
}
