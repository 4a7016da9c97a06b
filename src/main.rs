use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use uatu_stock_watcher::browser::ChromeLauncher;
use uatu_stock_watcher::logging::{self, DEFAULT_LOG_FILE};
use uatu_stock_watcher::notifier::SmtpMailer;
use uatu_stock_watcher::{Checker, Settings};

/// Watch a product page and email when it comes in stock
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Path to the ini configuration file
    #[arg(short, long, default_value = "config.ini")]
    config: PathBuf,

    /// File that log lines are appended to
    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,

    /// Run a single check and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    let _guard = logging::init(&cli.log_file)?;

    let settings = Settings::load(&cli.config).inspect_err(|e| {
        error!("Failed to load {}: {}", cli.config.display(), e);
    })?;

    info!(
        "Watching {} every {} seconds",
        settings.product.url,
        settings.check_interval.as_secs()
    );

    let browser = ChromeLauncher::new(settings.browser.clone());
    let mailer = SmtpMailer::new(&settings.smtp, &settings.email);
    let checker = Arc::new(Checker::new(settings, Box::new(browser), Box::new(mailer)));

    if cli.once {
        let result = tokio::task::spawn_blocking(move || checker.check_product()).await?;
        info!("Check finished: {:?}", result);
        return Ok(());
    }

    checker.run().await?;
    Ok(())
}
