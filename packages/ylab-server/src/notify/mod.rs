//! Outgoing email notifications.

mod mailer;
mod queue;
pub mod templates;

pub use mailer::{DisabledMailer, EmailMessage, MailError, Mailer, SmtpMailer};
pub use queue::Notifier;
pub use templates::DecisionDigest;
