pub mod browser;
pub mod checker;
pub mod config;
pub mod logging;
pub mod notifier;
pub mod utils;

// Re-export commonly used types
pub use crate::checker::{CheckResult, Checker};
pub use crate::config::Settings;
pub use crate::utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
