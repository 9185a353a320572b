use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::mailer::{DisabledMailer, EmailMessage, Mailer, SmtpMailer};
use crate::config::SmtpConfig;

/// Emails waiting for delivery before new ones are dropped
const QUEUE_CAPACITY: usize = 256;

/// Queues emails for a background dispatcher so handlers never wait on SMTP
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<EmailMessage>,
    transport: &'static str,
}

impl Notifier {
    /// Start a dispatcher delivering through `mailer`
    pub fn start(mailer: Arc<dyn Mailer>) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let transport = mailer.name();
        Self::spawn_dispatcher(mailer, rx);
        Self { tx, transport }
    }

    /// Pick SMTP when credentials are configured, otherwise log-only delivery
    pub fn from_config(config: &SmtpConfig) -> Self {
        if !config.is_enabled() {
            info!("📭 SMTP credentials not set, emails will only be logged");
            return Self::start(Arc::new(DisabledMailer));
        }

        match SmtpMailer::new(config) {
            Ok(mailer) => {
                info!("📬 Email notifications via {}:{}", config.host, config.port);
                Self::start(Arc::new(mailer))
            }
            Err(e) => {
                warn!("Failed to configure SMTP ({}), emails will only be logged", e);
                Self::start(Arc::new(DisabledMailer))
            }
        }
    }

    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Queue a message. Never blocks; a full or closed queue drops it with a warning.
    pub fn notify(&self, message: EmailMessage) {
        if let Err(e) = self.tx.try_send(message) {
            let message = match &e {
                mpsc::error::TrySendError::Full(m) | mpsc::error::TrySendError::Closed(m) => m,
            };
            warn!("Dropping email '{}' to {}: {}", message.subject, message.to, e);
        }
    }

    fn spawn_dispatcher(mailer: Arc<dyn Mailer>, mut rx: mpsc::Receiver<EmailMessage>) {
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match mailer.send(&message).await {
                    Ok(()) => debug!("Email '{}' sent to {}", message.subject, message.to),
                    Err(e) => warn!("Failed to send email '{}' to {}: {}", message.subject, message.to, e),
                }
            }
            debug!("Email dispatcher stopped");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::mailer::MailError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<EmailMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
            if self.fail {
                return Err(MailError::Transport("connection refused".to_string()));
            }
            self.sent.lock().push(message.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "Achat confirmé - YLab Hackathon".to_string(),
            html_body: "<p>ok</p>".to_string(),
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_messages_are_delivered_in_order() {
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::start(mailer.clone());

        notifier.notify(message("a@ylab.fr"));
        notifier.notify(message("b@ylab.fr"));
        settle().await;

        let sent = mailer.sent.lock();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "a@ylab.fr");
        assert_eq!(sent[1].to, "b@ylab.fr");
        assert_eq!(notifier.transport(), "recording");
    }

    #[tokio::test]
    async fn test_delivery_failures_do_not_stop_dispatcher() {
        let failing = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::start(failing.clone());

        notifier.notify(message("a@ylab.fr"));
        notifier.notify(message("b@ylab.fr"));
        settle().await;

        assert!(failing.sent.lock().is_empty());
        assert!(!notifier.tx.is_closed());
    }

    #[tokio::test]
    async fn test_disabled_without_credentials() {
        let config = SmtpConfig {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: "noreply@ylabhackathon.com".to_string(),
        };
        let notifier = Notifier::from_config(&config);
        assert_eq!(notifier.transport(), "disabled");
        notifier.notify(message("a@ylab.fr"));
    }
}
