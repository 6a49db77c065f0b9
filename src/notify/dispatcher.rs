//! Best-effort fan-out of an alert to every configured channel
//!
//! Channels are independent: a channel that is not configured, has no
//! recipients, or fails outright only affects its own outcome. Within the
//! chat channel every recipient is attempted regardless of the others.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use super::email::Mailer;
use super::telegram::ChatSender;
use crate::alerts::AlertMessage;
use crate::directory::SubscriberDirectory;

/// Sends alerts to the email and chat channels
pub struct Dispatcher {
    directory: Arc<dyn SubscriberDirectory>,
    mailer: Option<Arc<dyn Mailer>>,
    chat: Option<Arc<dyn ChatSender>>,
}

/// Why a channel did not send anything
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    /// Credentials or token not configured
    NotConfigured,
    NoRecipients,
}

/// Outcome of one channel for one alert
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ChannelOutcome {
    Skipped(SkipReason),
    /// The channel as a whole failed (directory or transport)
    Failed(String),
    Sent {
        attempted: usize,
        delivered: usize,
        failures: Vec<RecipientFailure>,
    },
}

/// A single recipient that could not be reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipientFailure {
    pub recipient: String,
    pub error: String,
}

/// Per-channel outcomes of a dispatch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub chat: ChannelOutcome,
}

impl ChannelOutcome {
    pub fn delivered(&self) -> usize {
        match self {
            ChannelOutcome::Sent { delivered, .. } => *delivered,
            _ => 0,
        }
    }
}

impl DispatchReport {
    /// Total recipients reached across channels
    pub fn delivered(&self) -> usize {
        self.email.delivered() + self.chat.delivered()
    }
}

impl Dispatcher {
    /// Dispatcher with no channels; add them with the `with_*` builders
    pub fn new(directory: Arc<dyn SubscriberDirectory>) -> Self {
        Self {
            directory,
            mailer: None,
            chat: None,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_chat(mut self, chat: Arc<dyn ChatSender>) -> Self {
        self.chat = Some(chat);
        self
    }

    /// Send `alert` on both channels concurrently
    pub async fn dispatch(&self, alert: &AlertMessage) -> DispatchReport {
        let (email, chat) = tokio::join!(self.dispatch_email(alert), self.dispatch_chat(alert));

        let report = DispatchReport { email, chat };
        tracing::info!(
            email = ?report.email,
            chat = ?report.chat,
            delivered = report.delivered(),
            "Alert dispatched"
        );
        report
    }

    async fn dispatch_email(&self, alert: &AlertMessage) -> ChannelOutcome {
        let Some(mailer) = &self.mailer else {
            tracing::warn!("Email credentials not configured, skipping email channel");
            return ChannelOutcome::Skipped(SkipReason::NotConfigured);
        };

        let recipients = match self.directory.email_recipients().await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read email subscribers");
                return ChannelOutcome::Failed(e.to_string());
            }
        };

        if recipients.is_empty() {
            tracing::info!("No email subscribers");
            return ChannelOutcome::Skipped(SkipReason::NoRecipients);
        }

        match mailer.send_bulk(&alert.subject, &alert.body, &recipients).await {
            Ok(addressed) => {
                tracing::info!(recipients = addressed, "Alert email sent");
                ChannelOutcome::Sent {
                    attempted: recipients.len(),
                    delivered: addressed,
                    failures: Vec::new(),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send alert email");
                ChannelOutcome::Failed(e.to_string())
            }
        }
    }

    async fn dispatch_chat(&self, alert: &AlertMessage) -> ChannelOutcome {
        let Some(chat) = &self.chat else {
            tracing::warn!("Bot token not configured, skipping chat channel");
            return ChannelOutcome::Skipped(SkipReason::NotConfigured);
        };

        let recipients = match self.directory.chat_recipients().await {
            Ok(recipients) => recipients,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read chat subscribers");
                return ChannelOutcome::Failed(e.to_string());
            }
        };

        if recipients.is_empty() {
            tracing::info!("No chat subscribers with notifications enabled");
            return ChannelOutcome::Skipped(SkipReason::NoRecipients);
        }

        let attempts = recipients.iter().map(|recipient| async move {
            chat.send_message(recipient, &alert.body)
                .await
                .map_err(|e| RecipientFailure {
                    recipient: recipient.clone(),
                    error: e.to_string(),
                })
        });

        let results = join_all(attempts).await;
        let failures: Vec<RecipientFailure> = results.into_iter().filter_map(Result::err).collect();

        for failure in &failures {
            tracing::warn!(
                recipient = %failure.recipient,
                error = %failure.error,
                "Chat delivery failed"
            );
        }

        ChannelOutcome::Sent {
            attempted: recipients.len(),
            delivered: recipients.len() - failures.len(),
            failures,
        }
    }
}
