//! Sequential per-record pipeline: build, send, archive.

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::archive::{iso_timestamp, ArchiveWriter};
use crate::builder;
use crate::config::{Credentials, PresetTable, SendFields};
use crate::dispatch;
use crate::email::DeliveryResult;
use crate::error::{Error, Result};
use crate::record::Record;
use crate::transport::{MailTransport, SmtpMailer};

/// Resolves the send fields of one record.
pub trait FieldAccessor {
    fn fields(&self, index: usize, record: &Record) -> Result<SendFields>;
}

/// The same fields for every record.
impl FieldAccessor for SendFields {
    fn fields(&self, _index: usize, _record: &Record) -> Result<SendFields> {
        Ok(self.clone())
    }
}

impl<F> FieldAccessor for F
where
    F: Fn(usize, &Record) -> Result<SendFields>,
{
    fn fields(&self, index: usize, record: &Record) -> Result<SendFields> {
        self(index, record)
    }
}

/// Reads fields from each record's JSON, layered over a defaults object.
#[derive(Debug, Clone, Default)]
pub struct JsonFields {
    defaults: serde_json::Map<String, Value>,
}

impl JsonFields {
    /// `defaults` must be a JSON object.
    pub fn new(defaults: Value) -> Result<Self> {
        match defaults {
            Value::Object(defaults) => Ok(Self { defaults }),
            Value::Null => Ok(Self::default()),
            _ => Err(Error::Config("field defaults must be a JSON object".to_string())),
        }
    }
}

impl FieldAccessor for JsonFields {
    fn fields(&self, _index: usize, record: &Record) -> Result<SendFields> {
        let mut merged = self.defaults.clone();
        for (key, value) in &record.json {
            merged.insert(key.clone(), value.clone());
        }
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| Error::Validation(format!("invalid send fields: {e}")))
    }
}

/// Batch-wide settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Record failures as outcomes instead of aborting the batch.
    pub continue_on_fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Sent(DeliveryResult),
    Failed(String),
}

/// Result for one input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    /// Position of the record in the input.
    pub item: usize,
    pub outcome: Outcome,
    pub timestamp: String,
}

impl ItemResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Sent(_))
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Outcome::Sent(delivery) => json!({
                "messageId": delivery.message_id,
                "accepted": delivery.accepted,
                "rejected": delivery.rejected,
                "response": delivery.response,
                "envelope": delivery.envelope,
                "success": true,
                "timestamp": self.timestamp,
                "item": self.item,
            }),
            Outcome::Failed(error) => json!({
                "error": error,
                "success": false,
                "timestamp": self.timestamp,
                "item": self.item,
            }),
        }
    }
}

/// Ordered results of one batch, one per input record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub results: Vec<ItemResult>,
}

impl BatchOutcome {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.results.iter().map(ItemResult::to_json).collect())
    }
}

/// Drives records through build, send and archive with one shared transport.
pub struct BatchRunner<T> {
    transport: T,
    options: BatchOptions,
}

impl<T: MailTransport> BatchRunner<T> {
    pub const fn new(transport: T, options: BatchOptions) -> Self {
        Self { transport, options }
    }

    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Process `records` in order.
    ///
    /// With continue-on-fail disabled the first failing record aborts the
    /// batch and its error is returned wrapped with the record index.
    pub async fn run<A>(&self, records: &[Record], accessor: &A) -> Result<BatchOutcome>
    where
        A: FieldAccessor + ?Sized,
    {
        let mut outcome = BatchOutcome {
            results: Vec::with_capacity(records.len()),
        };

        for (index, record) in records.iter().enumerate() {
            match self.process(index, record, accessor).await {
                Ok(delivery) => {
                    info!("Item {index}: sent {}", delivery.message_id);
                    outcome.results.push(ItemResult {
                        item: index,
                        outcome: Outcome::Sent(delivery),
                        timestamp: iso_timestamp(Utc::now()),
                    });
                }
                Err(e) if self.options.continue_on_fail => {
                    warn!("Item {index}: {e}");
                    outcome.results.push(ItemResult {
                        item: index,
                        outcome: Outcome::Failed(e.to_string()),
                        timestamp: iso_timestamp(Utc::now()),
                    });
                }
                Err(e) => {
                    error!("Item {index}: {e}, aborting batch");
                    return Err(e.at_item(index));
                }
            }
        }

        info!(
            "Batch finished: {} sent, {} failed",
            outcome.succeeded(),
            outcome.failed()
        );
        Ok(outcome)
    }

    async fn process<A>(&self, index: usize, record: &Record, accessor: &A) -> Result<DeliveryResult>
    where
        A: FieldAccessor + ?Sized,
    {
        let fields = accessor.fields(index, record)?;
        let message = builder::build(record, &fields)?;
        let options = &fields.options;
        let delivery = dispatch::send(&self.transport, &message, options.timeout_secs()).await?;

        if options.save_sent_email {
            let writer = ArchiveWriter::from_options(options);
            if let Err(e) = writer.persist(&message, &delivery).await {
                warn!("Item {index}: failed to save sent email: {e}");
            }
        }

        Ok(delivery)
    }
}

/// Configure one SMTP transport from `credentials` and run the batch on it.
pub async fn run_batch<A>(
    records: &[Record],
    accessor: &A,
    credentials: &Credentials,
    presets: &PresetTable,
    options: BatchOptions,
) -> Result<BatchOutcome>
where
    A: FieldAccessor + ?Sized,
{
    let transport = SmtpMailer::new(credentials, presets)?;
    BatchRunner::new(transport, options).run(records, accessor).await
}
