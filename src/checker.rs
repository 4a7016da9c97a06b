use std::future::Future;
use std::sync::Arc;

use crate::browser::{BrowserLauncher, PageSession};
use crate::config::Settings;
use crate::notifier::{self, Alert, Mailer};
use crate::{AppError, Result};

/// Outcome of one check cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResult {
    Blocked,
    InStock(String),
    OutOfStock(String),
    NotFound,
    Error(String),
}

impl CheckResult {
    /// The alert this outcome calls for, if any. Errors are reported
    /// separately by the cycle.
    fn alert(&self) -> Option<Alert> {
        match self {
            CheckResult::Blocked => Some(Alert::Blocked),
            CheckResult::InStock(_) => Some(Alert::InStock),
            _ => None,
        }
    }
}

/// Polls one product page and emails when it is in stock, looks blocked,
/// or the check itself fails.
pub struct Checker {
    settings: Settings,
    browser: Box<dyn BrowserLauncher>,
    mailer: Box<dyn Mailer>,
}

impl Checker {
    pub fn new(
        settings: Settings,
        browser: Box<dyn BrowserLauncher>,
        mailer: Box<dyn Mailer>,
    ) -> Self {
        Self {
            settings,
            browser,
            mailer,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one full cycle: open a browser session, inspect the page, send at
    /// most one alert, close the session.
    pub fn check_product(&self) -> CheckResult {
        let mut session = match self.browser.open_session() {
            Ok(session) => session,
            Err(e) => return self.report_error(e),
        };

        let result = self
            .inspect(session.as_ref())
            .and_then(|result| {
                if let Some(alert) = result.alert() {
                    self.notify(&alert)?;
                }
                Ok(result)
            })
            .unwrap_or_else(|e| self.report_error(e));

        session.close();
        result
    }

    fn inspect(&self, session: &dyn PageSession) -> Result<CheckResult> {
        let product = &self.settings.product;

        session.load(&product.url)?;

        if !session.page_contains(&product.blocking_text) {
            tracing::warn!("Possible blocking detected.");
            return Ok(CheckResult::Blocked);
        }

        let text = session
            .element_text(&product.selector)
            .filter(|text| !text.is_empty());

        let Some(text) = text else {
            tracing::info!("Button not found.");
            return Ok(CheckResult::NotFound);
        };

        tracing::info!("Button text: {}", text);
        if text.to_lowercase() == product.out_of_stock_text.to_lowercase() {
            Ok(CheckResult::OutOfStock(text))
        } else {
            tracing::info!("Product is in stock!");
            Ok(CheckResult::InStock(text))
        }
    }

    fn notify(&self, alert: &Alert) -> Result<()> {
        notifier::deliver(
            self.mailer.as_ref(),
            &self.settings.email.to,
            &self.settings.product.url,
            alert,
        )
    }

    fn report_error(&self, error: AppError) -> CheckResult {
        let message = error.to_string();
        tracing::error!("An error occurred: {}", message);

        if let Err(e) = self.notify(&Alert::Error(message.clone())) {
            tracing::error!("Failed to send error email: {}", e);
        }

        CheckResult::Error(message)
    }

    /// Check forever, sleeping `check_interval` between cycles, until
    /// Ctrl-C.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Check repeatedly until `shutdown` resolves. Shutdown is observed
    /// between cycles; a cycle in progress always finishes.
    pub async fn run_until<F>(self: Arc<Self>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Starting product checker.");
        tokio::pin!(shutdown);

        loop {
            let checker = Arc::clone(&self);
            let result = tokio::task::spawn_blocking(move || checker.check_product())
                .await
                .map_err(|e| AppError::Internal(format!("Check cycle panicked: {}", e)))?;
            tracing::debug!("Check finished: {:?}", result);

            let interval = self.settings.check_interval;
            tracing::info!("Waiting for {} seconds before next check.", interval.as_secs());

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutting down...");
                    return Ok(());
                }
            }
        }
    }
}
