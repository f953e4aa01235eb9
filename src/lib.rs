//! Batch email sending over SMTP with timeout-bounded dispatch and
//! best-effort JSON/EML archival of sent messages.

pub mod archive;
pub mod batch;
pub mod builder;
pub mod config;
pub mod dispatch;
pub mod email;
pub mod error;
pub mod record;
pub mod transport;

pub use archive::{render_eml, ArchiveRecord, ArchiveWriter};
pub use batch::{
    run_batch, BatchOptions, BatchOutcome, BatchRunner, FieldAccessor, ItemResult, JsonFields,
    Outcome,
};
pub use config::{Credentials, PresetTable, ProviderPreset, SaveFormat, SendFields, SendOptions};
pub use dispatch::{test_connection, ConnectionStatus, ConnectionTest};
pub use email::{Attachment, BodyFormat, DeliveryResult, Envelope, Mailbox, Message, Priority};
pub use error::{Error, Result};
pub use record::{BinaryData, Record};
pub use transport::{MailTransport, SmtpMailer};
