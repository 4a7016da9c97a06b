pub mod email;

pub use email::SmtpMailer;

use crate::Result;

/// One of the three messages the checker can send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alert {
    Blocked,
    InStock,
    Error(String),
}

impl Alert {
    pub fn subject(&self) -> &'static str {
        match self {
            Alert::Blocked => "Possible Blocking Detected",
            Alert::InStock => "Product In Stock",
            Alert::Error(_) => "Error in Product Checker",
        }
    }

    pub fn body(&self, url: &str) -> String {
        match self {
            Alert::Blocked => format!("The script might be blocked. Check the page: {}", url),
            Alert::InStock => format!("The product is in stock! Check it out: {}", url),
            Alert::Error(message) => {
                format!("An error occurred while checking the product: {}", message)
            }
        }
    }
}

/// Opens authenticated mail sessions.
#[cfg_attr(test, mockall::automock)]
pub trait Mailer: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MailSession>>;
}

#[cfg_attr(test, mockall::automock)]
pub trait MailSession: Send {
    fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<()>;
    fn disconnect(&mut self) -> Result<()>;
}

/// Connect, send one alert and disconnect. No retries.
pub fn deliver(mailer: &dyn Mailer, to: &str, url: &str, alert: &Alert) -> Result<()> {
    let mut session = mailer.connect()?;

    let sent = session.send(to, alert.subject(), &alert.body(url));

    if let Err(e) = session.disconnect() {
        tracing::warn!("Error disconnecting from SMTP server: {}", e);
    }

    sent
}
