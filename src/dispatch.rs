//! Timeout-bounded dispatch and the connectivity test.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{Credentials, PresetTable};
use crate::email::{DeliveryResult, Message};
use crate::error::{Error, Result};
use crate::transport::{MailTransport, SmtpMailer};

/// Send `message`, giving up after `timeout_secs`.
///
/// The send future is dropped when the timer wins; the transport's own
/// failure is returned as is.
pub async fn send<T>(transport: &T, message: &Message, timeout_secs: u64) -> Result<DeliveryResult>
where
    T: MailTransport + ?Sized,
{
    debug!("Dispatching \"{}\" with a {timeout_secs}s timeout", message.subject);
    match tokio::time::timeout(Duration::from_secs(timeout_secs), transport.send(message)).await {
        Ok(result) => result,
        Err(_) => {
            warn!("Send of \"{}\" timed out after {timeout_secs}s", message.subject);
            Err(Error::Timeout(timeout_secs))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    #[serde(rename = "OK")]
    Ok,
    Error,
}

/// Outcome of a connectivity test. Never an `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTest {
    pub status: ConnectionStatus,
    pub message: String,
}

impl ConnectionTest {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.status, ConnectionStatus::Ok)
    }

    fn failed(err: &Error) -> Self {
        Self {
            status: ConnectionStatus::Error,
            message: format!("SMTP connection failed: {err}"),
        }
    }
}

/// Configure an SMTP transport from `credentials` and verify it.
pub async fn test_connection(credentials: &Credentials, presets: &PresetTable) -> ConnectionTest {
    match SmtpMailer::new(credentials, presets) {
        Ok(mailer) => verify(&mailer).await,
        Err(e) => ConnectionTest::failed(&e),
    }
}

/// Verify an already configured transport.
pub async fn verify<T: MailTransport + ?Sized>(transport: &T) -> ConnectionTest {
    match transport.verify().await {
        Ok(()) => ConnectionTest {
            status: ConnectionStatus::Ok,
            message: "SMTP connection successful".to_string(),
        },
        Err(e) => ConnectionTest::failed(&e),
    }
}
