use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::config::SmtpConfig;

/// Outbound mail seam. The SMTP implementation is the only one used in
/// production; tests substitute [`RecordingMailer`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();
        let from = config.from.parse::<Mailbox>()?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse::<Mailbox>()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())?;

        self.transport.send(message).await?;
        info!(%to, %subject, "email sent");
        Ok(())
    }
}

/// In-memory mailer that remembers everything "sent".
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: std::sync::Mutex<Vec<SentMail>>,
}

#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()> {
        debug!(%to, %subject, "recording email");
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_mailer_captures_messages() {
        let mailer = RecordingMailer::default();
        mailer
            .send("someone@example.com", "Hello", "<p>hi</p>")
            .await
            .unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "someone@example.com");
        assert_eq!(sent[0].subject, "Hello");
        assert!(sent[0].html.contains("hi"));
    }
}
