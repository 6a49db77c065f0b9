//! In-process fakes for the alerter's external collaborators

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::directory::{ChatId, DirectoryError, SubscriberDirectory};
use crate::notify::{ChatError, ChatSender, MailError, Mailer};

#[derive(Default)]
pub struct FakeDirectory {
    pub emails: Vec<String>,
    pub chats: Vec<ChatId>,
    pub unavailable: bool,
}

impl FakeDirectory {
    pub fn with_subscribers() -> Self {
        Self {
            emails: vec!["a@example.com".into(), "b@example.com".into()],
            chats: vec!["1".into(), "2".into(), "3".into()],
            unavailable: false,
        }
    }
}

#[async_trait]
impl SubscriberDirectory for FakeDirectory {
    async fn email_recipients(&self) -> Result<Vec<String>, DirectoryError> {
        if self.unavailable {
            return Err(DirectoryError::Query(sqlx::Error::PoolTimedOut));
        }
        Ok(self.emails.clone())
    }

    async fn chat_recipients(&self) -> Result<Vec<ChatId>, DirectoryError> {
        if self.unavailable {
            return Err(DirectoryError::Query(sqlx::Error::PoolTimedOut));
        }
        Ok(self.chats.clone())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<(String, Vec<String>)>>,
    pub broken: bool,
}

impl FakeMailer {
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send_bulk(
        &self,
        subject: &str,
        _body: &str,
        recipients: &[String],
    ) -> Result<usize, MailError> {
        if self.broken {
            return Err(MailError::NoValidRecipients);
        }
        self.sent.lock().push((subject.to_string(), recipients.to_vec()));
        Ok(recipients.len())
    }
}

#[derive(Default)]
pub struct FakeChat {
    pub attempts: Mutex<Vec<String>>,
    pub failing: Vec<String>,
    pub delay: Option<Duration>,
}

#[async_trait]
impl ChatSender for FakeChat {
    async fn send_message(&self, recipient: &str, _text: &str) -> Result<(), ChatError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.attempts.lock().push(recipient.to_string());
        if self.failing.iter().any(|f| f == recipient) {
            return Err(ChatError::Status(502));
        }
        Ok(())
    }
}
