use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::transport::smtp::client::{SmtpConnection, TlsParameters};
use lettre::transport::smtp::extension::ClientId;
use lettre::Message;
use std::time::Duration;

use super::{MailSession, Mailer};
use crate::config::{EmailSettings, SmtpSettings};
use crate::{AppError, Result};

// Same as lettre's SmtpTransport default
const SMTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends mail through an implicit-TLS SMTP submission endpoint
/// (port 465 by default) as the configured account.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpSettings, email: &EmailSettings) -> Self {
        Self {
            host: smtp.host.clone(),
            port: smtp.port,
            username: email.user.clone(),
            password: email.password.clone(),
        }
    }
}

impl Mailer for SmtpMailer {
    fn connect(&self) -> Result<Box<dyn MailSession>> {
        tracing::info!("Connecting to SMTP server.");

        let tls = TlsParameters::new(self.host.clone())?;
        let hello = ClientId::Domain("localhost".to_string());

        let mut connection = SmtpConnection::connect(
            (self.host.as_str(), self.port),
            Some(SMTP_TIMEOUT),
            &hello,
            Some(&tls),
            None,
        )
        .map_err(|e| {
            tracing::error!("Error connecting to SMTP server: {}", e);
            AppError::Notify(format!("Failed to connect to {}:{}: {}", self.host, self.port, e))
        })?;

        let credentials = Credentials::new(self.username.clone(), self.password.clone());
        if let Err(e) = connection.auth(&[Mechanism::Plain, Mechanism::Login], &credentials) {
            tracing::error!("Error authenticating with SMTP server: {}", e);
            let _ = connection.quit();
            return Err(AppError::Notify(format!("SMTP authentication failed: {}", e)));
        }

        Ok(Box::new(SmtpSession {
            connection,
            from: self.username.clone(),
        }))
    }
}

pub struct SmtpSession {
    connection: SmtpConnection,
    from: String,
}

impl MailSession for SmtpSession {
    fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<()> {
        let message = build_message(&self.from, to, subject, body)?;

        tracing::info!("Sending email to {} with subject: {}", to, subject);
        self.connection
            .send(message.envelope(), &message.formatted())
            .map_err(|e| {
                tracing::error!("Error sending email: {}", e);
                AppError::Notify(format!("Failed to send email: {}", e))
            })?;

        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        tracing::info!("Disconnecting from SMTP server.");
        self.connection.quit()?;
        Ok(())
    }
}

fn build_message(from: &str, to: &str, subject: &str, body: &str) -> Result<Message> {
    let from: Mailbox = from
        .parse()
        .map_err(|e| AppError::Notify(format!("Invalid sender address '{}': {}", from, e)))?;
    let to: Mailbox = to
        .parse()
        .map_err(|e| AppError::Notify(format!("Invalid recipient address '{}': {}", to, e)))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(header::ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| AppError::Notify(format!("Failed to build email: {}", e)))
}
