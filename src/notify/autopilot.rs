//! Autopilot transactional email client.
//!
//! Sends the report through the provider's `transactional/send` endpoint.
//! The provider upserts the recipient as a contact, merged on the email
//! address, before sending.

use super::{Delivery, Notifier, OutgoingEmail};
use crate::error::NotifyError;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Field name the provider uses for a contact's email address.
const EMAIL_FIELD: &str = "str::email";

/// Provider enum: update the existing contact when the merge key matches.
const MERGE_STRATEGY_UPDATE: u8 = 2;

/// Provider enum: find contacts by the merge key.
const FIND_STRATEGY_MERGE_KEY: u8 = 0;

/// Connection settings for the provider.
#[derive(Debug, Clone)]
pub struct AutopilotConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_email: String,
    pub from_name: String,
    /// Value of the `str::soi-ctx` contact field.
    pub source_context: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Serialize)]
struct TransactionalSend<'a> {
    asset: Asset<'a>,
    emails: Vec<Contact<'a>>,
    merge_by: Vec<&'static str>,
    merge_strategy: u8,
    find_strategy: u8,
    skip_non_existing: bool,
}

#[derive(Debug, Serialize)]
struct Asset<'a> {
    from_email: &'a str,
    from_name: &'a str,
    cc: &'a [String],
    subject: &'a str,
    email_name: &'a str,
    html_body: &'a str,
    liquid_syntax_enabled: bool,
}

#[derive(Debug, Serialize)]
struct Contact<'a> {
    fields: ContactFields<'a>,
    location: Option<()>,
}

#[derive(Debug, Serialize)]
struct ContactFields<'a> {
    #[serde(rename = "bol::sp")]
    subscribed: bool,
    #[serde(rename = "str::email")]
    email: &'a str,
    #[serde(rename = "str::soi-ctx")]
    source_context: &'a str,
}

impl<'a> TransactionalSend<'a> {
    fn new(email: &'a OutgoingEmail, config: &'a AutopilotConfig) -> Self {
        Self {
            asset: Asset {
                from_email: &config.from_email,
                from_name: &config.from_name,
                cc: &email.cc,
                subject: &email.subject,
                email_name: &email.email_name,
                html_body: &email.html_body,
                liquid_syntax_enabled: true,
            },
            emails: vec![Contact {
                fields: ContactFields {
                    subscribed: true,
                    email: &email.to,
                    source_context: &config.source_context,
                },
                location: None,
            }],
            merge_by: vec![EMAIL_FIELD],
            merge_strategy: MERGE_STRATEGY_UPDATE,
            find_strategy: FIND_STRATEGY_MERGE_KEY,
            skip_non_existing: false,
        }
    }
}

/// Sends reports through the Autopilot API.
pub struct AutopilotNotifier {
    config: AutopilotConfig,
    http_client: reqwest::Client,
}

impl AutopilotNotifier {
    pub fn new(config: AutopilotConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
        })
    }

    async fn try_send(&self, email: &OutgoingEmail) -> Result<(), NotifyError> {
        email.validate()?;

        let payload = TransactionalSend::new(email, &self.config);
        debug!("Posting transactional send to {}", self.config.api_url);

        let response = self
            .http_client
            .post(&self.config.api_url)
            .header("X-Api-Key", &self.config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Transport(format!(
                        "request timed out after {}s",
                        self.config.timeout_seconds
                    ))
                } else if e.is_connect() {
                    NotifyError::Transport(format!("cannot connect to {}", self.config.api_url))
                } else {
                    NotifyError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: Value =
            serde_json::from_str(&body).map_err(|e| NotifyError::Decode(e.to_string()))?;
        debug!("Provider response: {}", data);

        match data.get("error") {
            Some(error) if is_truthy(error) => Err(NotifyError::Provider(describe_error(error))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Notifier for AutopilotNotifier {
    async fn send(&self, email: &OutgoingEmail) -> Delivery {
        match self.try_send(email).await {
            Ok(()) => {
                info!("Sent '{}' to {}", email.subject, email.to);
                Delivery::sent()
            }
            Err(e) => {
                warn!("Report was not delivered: {}", e);
                Delivery::failed(e)
            }
        }
    }
}

/// Whether an `error` field actually signals an error.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn describe_error(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}
