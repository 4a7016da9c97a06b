//! Rendered page access through headless Chrome.
//!
//! The checker only talks to the [`BrowserLauncher`] and [`PageSession`]
//! traits; [`ChromeLauncher`] is the production implementation.

use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::BrowserSettings;
use crate::{AppError, Result};

/// Starts one browser session per check cycle.
#[cfg_attr(test, mockall::automock)]
pub trait BrowserLauncher: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn PageSession>>;
}

/// A live page in a browser. Closed exactly once by the checker.
#[cfg_attr(test, mockall::automock)]
pub trait PageSession: Send {
    /// Navigate and wait for the document body. Errors propagate.
    fn load(&self, url: &str) -> Result<()>;

    /// Lower-cased text of the first element matching `selector`, or `None`
    /// if it does not show up before the timeout.
    fn element_text(&self, selector: &str) -> Option<String>;

    /// Case-insensitive search over the rendered page source.
    fn page_contains(&self, text: &str) -> bool;

    /// Release browser resources. Never fails.
    fn close(&mut self);
}

pub struct ChromeLauncher {
    settings: BrowserSettings,
}

impl ChromeLauncher {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.settings.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some(self.settings.window_size))
            .args(vec![OsStr::new("--disable-gpu")])
            .build()
            .map_err(|e| AppError::Session(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.settings.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        Ok(launch_options)
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn open_session(&self) -> Result<Box<dyn PageSession>> {
        tracing::debug!("Launching browser (headless: {})", self.settings.headless);

        let browser = Browser::new(self.launch_options()?)
            .map_err(|e| AppError::Session(format!("Failed to launch browser: {}", e)))?;

        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Session(format!("Failed to create tab: {}", e)))?;

        tab.set_user_agent(&self.settings.user_agent, None, None)
            .map_err(|e| AppError::Session(format!("Failed to set user agent: {}", e)))?;

        // Navigation waits use the tab default, not the per-call timeout
        tab.set_default_timeout(self.settings.timeout);

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
            timeout: self.settings.timeout,
        }))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Arc<Tab>,
    timeout: Duration,
}

impl PageSession for ChromeSession {
    fn load(&self, url: &str) -> Result<()> {
        tracing::info!("Loading page: {}", url);

        let load_error = |e: anyhow::Error| {
            tracing::error!("Error loading page: {}", e);
            AppError::Load {
                url: url.to_string(),
                message: e.to_string(),
            }
        };

        self.tab
            .navigate_to(url)
            .map_err(load_error)?
            .wait_until_navigated()
            .map_err(load_error)?;

        self.tab
            .wait_for_element_with_custom_timeout("body", self.timeout)
            .map_err(load_error)?;

        Ok(())
    }

    fn element_text(&self, selector: &str) -> Option<String> {
        let element = match self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.timeout)
        {
            Ok(element) => element,
            Err(e) => {
                tracing::error!("Element not found: {} ({})", selector, e);
                return None;
            }
        };

        match element.get_inner_text() {
            Ok(text) => Some(normalize_text(&text)),
            Err(e) => {
                tracing::error!("Error getting element text: {}", e);
                None
            }
        }
    }

    fn page_contains(&self, text: &str) -> bool {
        match self.tab.get_content() {
            Ok(source) => contains_ignore_case(&source, text),
            Err(e) => {
                tracing::error!("Error checking for text: {}", e);
                false
            }
        }
    }

    fn close(&mut self) {
        let Some(browser) = self.browser.take() else {
            return;
        };

        tracing::info!("Closing browser.");
        if let Err(e) = self.tab.close(true) {
            tracing::warn!("Error while closing browser tab: {}", e);
        }

        // Dropping the last handle kills the Chrome process
        drop(browser);
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.close();
    }
}

pub(crate) fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
