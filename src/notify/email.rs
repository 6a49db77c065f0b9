//! Bulk email channel over authenticated SMTP submission

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::EmailConfig;

/// Port using TLS from the first byte rather than STARTTLS
const IMPLICIT_TLS_PORT: u16 = 465;

/// Sends one message to many recipients
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `body` to every valid address in `recipients`.
    ///
    /// Returns how many recipients the message was addressed to.
    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<usize, MailError>;
}

/// SMTP mailer built from the sender's credentials
pub struct SmtpMailer {
    sender: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, MailError> {
        let sender: Mailbox = config.sender.parse()?;
        let credentials = Credentials::new(config.sender.clone(), config.password.clone());

        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
        };

        let transport = builder
            .port(config.smtp_port)
            .credentials(credentials)
            .timeout(Some(timeout))
            .build();

        Ok(Self { sender, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_bulk(
        &self,
        subject: &str,
        body: &str,
        recipients: &[String],
    ) -> Result<usize, MailError> {
        let (message, addressed) = build_message(&self.sender, subject, body, recipients)?;
        self.transport.send(message).await?;
        Ok(addressed)
    }
}

/// Plain-text message with every valid recipient on Bcc.
///
/// Invalid addresses are logged and left out; the message fails to build
/// only when none are left.
pub fn build_message(
    sender: &Mailbox,
    subject: &str,
    body: &str,
    recipients: &[String],
) -> Result<(Message, usize), MailError> {
    let mut builder = Message::builder()
        .from(sender.clone())
        .subject(subject)
        .header(ContentType::TEXT_PLAIN);

    let mut addressed = 0;
    for recipient in recipients {
        match recipient.parse::<Mailbox>() {
            Ok(mailbox) => {
                builder = builder.bcc(mailbox);
                addressed += 1;
            }
            Err(e) => {
                tracing::warn!(recipient = %recipient, error = %e, "Skipping invalid email address");
            }
        }
    }

    if addressed == 0 {
        return Err(MailError::NoValidRecipients);
    }

    let message = builder.body(body.to_string())?;
    Ok((message, addressed))
}

/// Email channel errors
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("No valid email recipients")]
    NoValidRecipients,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Mailbox {
        "alerts@example.com".parse().unwrap()
    }

    #[test]
    fn test_build_message_skips_invalid_addresses() {
        let recipients = vec![
            "a@example.com".to_string(),
            "not an address".to_string(),
            "b@example.com".to_string(),
        ];

        let (message, addressed) =
            build_message(&sender(), "Alert", "Temperature high", &recipients).unwrap();
        assert_eq!(addressed, 2);
        assert_eq!(message.envelope().to().len(), 2);
        assert_eq!(
            message.envelope().from().map(|a| a.to_string()),
            Some("alerts@example.com".to_string())
        );

        // Bcc must not leak into the rendered headers
        let rendered = String::from_utf8(message.formatted()).unwrap();
        assert!(!rendered.contains("b@example.com"));
        assert!(rendered.contains("Temperature high"));
    }

    #[test]
    fn test_build_message_without_valid_recipients() {
        let recipients = vec!["nope".to_string()];
        assert!(matches!(
            build_message(&sender(), "Alert", "body", &recipients),
            Err(MailError::NoValidRecipients)
        ));
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 465,
            sender: "not-an-address".to_string(),
            password: "secret".to_string(),
        };
        assert!(matches!(
            SmtpMailer::new(&config, Duration::from_secs(5)),
            Err(MailError::Address(_))
        ));
    }
}
