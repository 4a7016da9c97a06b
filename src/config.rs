use config::{Config, File, FileStoredFormat, Format, Map, Value, ValueKind};
use ini::{Ini, ParseOption};
use serde::Deserialize;
use std::env;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::{AppError, Result};

pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_OUT_OF_STOCK_TEXT: &str = "finns ej i lager";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/95.0.4638.69 Safari/537.36";
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1920, 1080);
pub const DEFAULT_BROWSER_TIMEOUT: Duration = Duration::from_secs(10);

/// Immutable settings for one watcher process, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    pub email: EmailSettings,
    pub smtp: SmtpSettings,
    pub product: ProductSettings,
    pub check_interval: Duration,
    pub browser: BrowserSettings,
}

#[derive(Clone)]
pub struct EmailSettings {
    pub user: String,
    pub password: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ProductSettings {
    pub url: String,
    pub selector: String,
    pub blocking_text: String,
    pub out_of_stock_text: String,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub user_agent: String,
    pub window_size: (u32, u32),
    pub timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: DEFAULT_BROWSER_TIMEOUT,
        }
    }
}

impl fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("to", &self.to)
            .finish()
    }
}

// Ini files are read as nested string tables; sections keep their upper-case
// names unless the loader lower-cases keys, so accept both spellings.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(rename = "EMAIL", alias = "email")]
    email: RawEmail,
    #[serde(rename = "PRODUCT", alias = "product")]
    product: RawProduct,
    #[serde(rename = "SETTINGS", alias = "settings")]
    settings: RawSettings,
    #[serde(rename = "SMTP", alias = "smtp", default)]
    smtp: RawSmtp,
    #[serde(rename = "BROWSER", alias = "browser", default)]
    browser: RawBrowser,
}

#[derive(Debug, Deserialize)]
struct RawEmail {
    user: String,
    password: String,
    to: String,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    url: String,
    selector: String,
    blocking_text: String,
    #[serde(default)]
    out_of_stock_text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    check_interval: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawSmtp {
    #[serde(default)]
    host: Option<String>,
    #[serde(default)]
    port: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawBrowser {
    #[serde(default)]
    headless: Option<String>,
    #[serde(default)]
    chrome_path: Option<String>,
}

/// Ini format that keeps values exactly as written.
///
/// The stock `FileFormat::Ini` unquotes values and expands backslash
/// escapes, which would rewrite passwords such as `p\ass`.
#[derive(Debug, Clone, Copy)]
struct LiteralIni;

impl Format for LiteralIni {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> std::result::Result<Map<String, Value>, Box<dyn Error + Send + Sync>> {
        let options = ParseOption {
            enabled_quote: false,
            enabled_escape: false,
        };
        let ini = Ini::load_from_str_opt(text, options)?;

        let string_table = |props: &ini::Properties| {
            props
                .iter()
                .map(|(k, v)| (k.to_owned(), Value::new(uri, ValueKind::String(v.to_owned()))))
                .collect::<Map<String, Value>>()
        };

        let mut root = Map::new();
        for (section, props) in ini.iter() {
            match section {
                Some(section) => {
                    let table = Value::new(uri, ValueKind::Table(string_table(props)));
                    root.insert(section.to_owned(), table);
                }
                None => root.extend(string_table(props)),
            }
        }
        Ok(root)
    }
}

impl FileStoredFormat for LiteralIni {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["ini"]
    }
}

impl Settings {
    /// Read an ini file such as `config.ini`.
    ///
    /// Fails with [`AppError::Config`] when the file is missing, a required
    /// section or key is absent, or a value does not parse.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw: RawConfig = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), LiteralIni).required(true))
            .build()?
            .try_deserialize()?;

        let mut settings = Self::from_raw(raw)?;

        // Add Chrome path from environment if not set
        if settings.browser.chrome_path.is_none() {
            settings.browser.chrome_path = env::var_os("CHROME_PATH").map(PathBuf::from);
        }

        settings.validate()?;
        Ok(settings)
    }

    fn from_raw(raw: RawConfig) -> Result<Self> {
        let check_interval = parse_interval(&raw.settings.check_interval)?;

        let port = match raw.smtp.port.as_deref().map(str::trim) {
            None | Some("") => DEFAULT_SMTP_PORT,
            Some(value) => value.parse::<u16>().map_err(|_| {
                AppError::Config(format!(
                    "SMTP port must be a number between 1 and 65535, got '{}'",
                    value
                ))
            })?,
        };

        let headless = match raw.browser.headless.as_deref() {
            None => true,
            Some(value) => parse_bool(value).ok_or_else(|| {
                AppError::Config(format!("BROWSER headless must be a boolean, got '{}'", value))
            })?,
        };

        Ok(Self {
            email: EmailSettings {
                user: raw.email.user,
                password: raw.email.password,
                to: raw.email.to,
            },
            smtp: SmtpSettings {
                host: raw
                    .smtp
                    .host
                    .filter(|h| !h.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port,
            },
            product: ProductSettings {
                url: raw.product.url,
                selector: raw.product.selector,
                blocking_text: raw.product.blocking_text,
                out_of_stock_text: raw
                    .product
                    .out_of_stock_text
                    .unwrap_or_else(|| DEFAULT_OUT_OF_STOCK_TEXT.to_string()),
            },
            check_interval,
            browser: BrowserSettings {
                headless,
                chrome_path: raw
                    .browser
                    .chrome_path
                    .filter(|p| !p.trim().is_empty())
                    .map(PathBuf::from),
                ..BrowserSettings::default()
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.check_interval.is_zero() {
            return Err(AppError::Config("SETTINGS check_interval must be greater than 0".into()));
        }

        match Url::parse(&self.product.url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            _ => {
                return Err(AppError::Config(format!(
                    "PRODUCT url must be an absolute http(s) URL, got '{}'",
                    self.product.url
                )));
            }
        }

        if self.product.selector.trim().is_empty() {
            return Err(AppError::Config("PRODUCT selector must not be empty".into()));
        }

        if self.email.user.trim().is_empty() || self.email.to.trim().is_empty() {
            return Err(AppError::Config("EMAIL user and to must not be empty".into()));
        }

        if self.smtp.port == 0 {
            return Err(AppError::Config("SMTP port must be greater than 0".into()));
        }

        Ok(())
    }
}

fn parse_interval(value: &str) -> Result<Duration> {
    let seconds = value.trim().parse::<u64>().map_err(|_| {
        AppError::Config(format!(
            "SETTINGS check_interval must be a positive integer number of seconds, got '{}'",
            value
        ))
    })?;
    if seconds == 0 {
        return Err(AppError::Config("SETTINGS check_interval must be greater than 0".into()));
    }
    Ok(Duration::from_secs(seconds))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}
