//! Alert notifications for critical gate and security events
//!
//! Handlers hand alerts to an injected [`Notifier`]. Delivery runs in a
//! background task; failures are logged and never reach the client.

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use leadgate_common::ClientKey;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A client was placed in the suspicion registry
    ClientFlagged,
    /// A peer handler reported a critical attack
    CriticalAttack,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: Uuid,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientKey>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            message: message.into(),
            client: None,
            raised_at: Utc::now(),
        }
    }

    pub fn for_client(mut self, client: ClientKey) -> Self {
        self.client = Some(client);
        self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected alert with status {0}")]
    Rejected(reqwest::StatusCode),
}

/// Delivers alerts to operators
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>>;
}

/// Writes alerts to the log only
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            tracing::warn!(
                alert_id = %alert.id,
                kind = ?alert.kind,
                client = alert.client.as_ref().map(ClientKey::as_str),
                "{}: {}",
                alert.title,
                alert.message
            );
            Ok(())
        })
    }
}

/// Posts alerts as JSON to a webhook
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl Notifier for WebhookNotifier {
    fn notify<'a>(&'a self, alert: &'a Alert) -> BoxFuture<'a, Result<(), NotifyError>> {
        Box::pin(async move {
            let response = self.client.post(&self.url).json(alert).send().await?;

            if !response.status().is_success() {
                return Err(NotifyError::Rejected(response.status()));
            }

            tracing::debug!(alert_id = %alert.id, "Alert delivered to webhook");
            Ok(())
        })
    }
}

/// Pick the notifier for the configured webhook, falling back to logging
pub fn from_config(webhook_url: Option<&str>) -> Arc<dyn Notifier> {
    match webhook_url {
        Some(url) => match WebhookNotifier::new(url) {
            Ok(notifier) => {
                tracing::info!("Alerts will be posted to {}", url);
                Arc::new(notifier)
            }
            Err(e) => {
                tracing::error!("Failed to build webhook notifier, alerts will only be logged: {}", e);
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    }
}

/// Deliver an alert without blocking the caller
pub fn dispatch(notifier: Arc<dyn Notifier>, alert: Alert) {
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&alert).await {
            tracing::error!(alert_id = %alert.id, "Failed to deliver alert: {}", e);
        }
    });
}
