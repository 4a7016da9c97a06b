// Test doubles for the browser and the mail server.
//
// The page double serves a fixed HTML snapshot and answers selector queries
// with the `scraper` crate, so the checker runs end to end without Chrome or
// an SMTP endpoint.

use scraper::{Html, Selector};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uatu_stock_watcher::browser::{BrowserLauncher, PageSession};
use uatu_stock_watcher::config::{
    BrowserSettings, EmailSettings, ProductSettings, Settings, SmtpSettings,
};
use uatu_stock_watcher::notifier::{MailSession, Mailer};
use uatu_stock_watcher::{AppError, Checker, Result};

pub const PRODUCT_URL: &str =
    "https://www.inet.se/produkt/5413207/nvidia-geforce-rtx-5090-founders-edition";
pub const RECIPIENT: &str = "me@example.com";

pub fn product_page(button: Option<&str>) -> String {
    let button = button
        .map(|text| format!(r#"<button class="buy">{}</button>"#, text))
        .unwrap_or_default();

    format!(
        r#"
        <html>
            <head><title>NVIDIA GeForce RTX 5090 Founders Edition</title></head>
            <body>
                <h1>NVIDIA GeForce RTX 5090 Founders Edition</h1>
                <div class="price">24 990 kr</div>
                {}
            </body>
        </html>
        "#,
        button
    )
}

pub const CAPTCHA_PAGE: &str = r#"
    <html>
        <body><h1>Please verify you are a human</h1></body>
    </html>
"#;

pub fn test_settings() -> Settings {
    Settings {
        email: EmailSettings {
            user: "watcher@gmail.com".to_string(),
            password: "app-password".to_string(),
            to: RECIPIENT.to_string(),
        },
        smtp: SmtpSettings {
            host: "smtp.gmail.com".to_string(),
            port: 465,
        },
        product: ProductSettings {
            url: PRODUCT_URL.to_string(),
            selector: "button.buy".to_string(),
            blocking_text: "RTX 5090".to_string(),
            out_of_stock_text: "finns ej i lager".to_string(),
        },
        check_interval: Duration::from_secs(1),
        browser: BrowserSettings::default(),
    }
}

/// Serves `html` for every load; `None` makes every load fail.
#[derive(Clone, Default)]
pub struct SnapshotBrowser {
    html: Option<String>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl SnapshotBrowser {
    pub fn serving(html: impl Into<String>) -> Self {
        Self {
            html: Some(html.into()),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for SnapshotBrowser {
    fn open_session(&self) -> Result<Box<dyn PageSession>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SnapshotSession {
            html: self.html.clone(),
            closed: Arc::clone(&self.closed),
        }))
    }
}

struct SnapshotSession {
    html: Option<String>,
    closed: Arc<AtomicUsize>,
}

impl PageSession for SnapshotSession {
    fn load(&self, url: &str) -> Result<()> {
        match self.html {
            Some(_) => Ok(()),
            None => Err(AppError::Load {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    fn element_text(&self, selector: &str) -> Option<String> {
        let document = Html::parse_document(self.html.as_deref()?);
        let selector = Selector::parse(selector).ok()?;
        let element = document.select(&selector).next()?;
        Some(element.text().collect::<String>().trim().to_lowercase())
    }

    fn page_contains(&self, text: &str) -> bool {
        self.html
            .as_deref()
            .is_some_and(|html| html.to_lowercase().contains(&text.to_lowercase()))
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Records sent mail. A rejecting mailer fails every connection attempt
/// and counts them instead.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    reject: bool,
    outbox: Arc<Mutex<Vec<SentMail>>>,
    attempts: Arc<AtomicUsize>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.outbox.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Mailer for RecordingMailer {
    fn connect(&self) -> Result<Box<dyn MailSession>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(AppError::Notify("535 authentication failed".to_string()));
        }
        Ok(Box::new(RecordingSession {
            outbox: Arc::clone(&self.outbox),
        }))
    }
}

struct RecordingSession {
    outbox: Arc<Mutex<Vec<SentMail>>>,
}

impl MailSession for RecordingSession {
    fn send(&mut self, to: &str, subject: &str, body: &str) -> Result<()> {
        self.outbox.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn checker_with(
    settings: Settings,
    browser: &SnapshotBrowser,
    mailer: &RecordingMailer,
) -> Checker {
    Checker::new(settings, Box::new(browser.clone()), Box::new(mailer.clone()))
}
