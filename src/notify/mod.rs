//! Notification channels for triggered alerts

pub mod dispatcher;
pub mod email;
pub mod telegram;

pub use dispatcher::{ChannelOutcome, DispatchReport, Dispatcher, RecipientFailure, SkipReason};
pub use email::{MailError, Mailer, SmtpMailer};
pub use telegram::{ChatError, ChatSender, TelegramSender};
