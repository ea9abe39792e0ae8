//! SMTP alert delivery.
//!
//! The transport is built once at startup. The password comes from the
//! config file or, preferably, from `WATCHTOWER_SMTP_PASSWORD`.

use super::{AlertSink, NotifyError};
use crate::config::EmailConf;
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

pub const SMTP_PASSWORD_ENV: &str = "WATCHTOWER_SMTP_PASSWORD";

pub struct EmailAlertSink {
    from: Mailbox,
    to: Mailbox,
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailAlertSink {
    pub fn new(conf: &EmailConf) -> Result<Self, NotifyError> {
        let from: Mailbox = conf.from.parse()?;
        let to: Mailbox = conf.to.parse()?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&conf.smtp_host)?
            .port(conf.smtp_port);

        let password = std::env::var(SMTP_PASSWORD_ENV).ok().or_else(|| conf.password.clone());
        if let (Some(user), Some(pass)) = (&conf.username, password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass));
        }

        Ok(Self { from, to, mailer: builder.build() })
    }

    fn message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| NotifyError::Build(e.to_string()))
    }
}

#[async_trait]
impl AlertSink for EmailAlertSink {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let email = self.message(subject, body)?;
        self.mailer.send(email).await?;
        tracing::info!(to = %self.to, subject, "alert email sent");
        Ok(())
    }
}
