//! Report delivery.
//!
//! A notifier never fails its caller: every outcome is folded into a
//! [`Delivery`], with the error kept for logging and the run result.

pub mod autopilot;

pub use autopilot::{AutopilotConfig, AutopilotNotifier};

use crate::error::NotifyError;
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

/// A rendered report addressed to its recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub cc: Vec<String>,
    pub subject: String,
    /// Provider-side name of the email, used for grouping in its dashboard.
    pub email_name: String,
    pub html_body: String,
}

impl OutgoingEmail {
    /// Checks the fields the provider requires.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.to.trim().is_empty() {
            return Err(NotifyError::InvalidEmail("recipient is empty".to_string()));
        }
        if self.subject.trim().is_empty() {
            return Err(NotifyError::InvalidEmail("subject is empty".to_string()));
        }
        if self.html_body.trim().is_empty() {
            return Err(NotifyError::InvalidEmail("body is empty".to_string()));
        }
        Ok(())
    }
}

/// Result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<NotifyError>,
}

impl Delivery {
    pub fn sent() -> Self {
        Self {
            delivered: true,
            error: None,
        }
    }

    pub fn failed(error: NotifyError) -> Self {
        Self {
            delivered: false,
            error: Some(error),
        }
    }
}

/// Sends a rendered report. Implementations make at most one attempt.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Delivery;
}

/// Logs the email instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Delivery {
        if let Err(e) = email.validate() {
            return Delivery::failed(e);
        }

        info!(
            "Dry run: would send '{}' to {} (cc: {})",
            email.subject,
            email.to,
            email.cc.join(", ")
        );
        Delivery::sent()
    }
}
