//! Onleihe Watcher CLI
//!
//! Polls the configured catalogs and notifies about new media.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use onleihe_watch::{
    error::{AppError, Result},
    models::{Config, Media},
    pipeline::{KeywordFilter, Watcher},
    services::{CatalogCrawler, CatalogSource, LendingService, LibrarySession},
    utils::http,
};

/// onleihe-watch - New media notifier for Onleihe libraries
#[derive(Parser, Debug)]
#[command(
    name = "onleihe-watch",
    version,
    about = "Watches Onleihe catalogs for new media"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the catalogs until interrupted (default)
    Run,

    /// Fetch every catalog once and print the listed media
    Scan {
        /// Print JSON instead of one line per item
        #[arg(long)]
        json: bool,
    },

    /// Log in once and report the outcome
    Login,

    /// Validate the configuration and keyword file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::load(&cli.config).map_err(|e| {
        log::error!("Failed to load config from {}: {}", cli.config.display(), e);
        e
    })?;
    config.validate()?;
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            log::info!(
                "Watching {} catalog(s) every {:?}",
                config.urls.len(),
                config.poll_interval()
            );
            Watcher::from_config(&config)?.run().await?;
        }

        Command::Scan { json } => {
            let client = http::create_async_client(&config.http)?;
            let crawler = CatalogCrawler::new(client, &config.http)?;

            let mut media: Vec<Media> = Vec::new();
            for (label, url) in &config.urls {
                match crawler.fetch(url).await {
                    Ok(items) => {
                        log::info!("{}: {} items", label, items.len());
                        media.extend(items);
                    }
                    Err(e) if e.is_transport() => {
                        log::warn!("Network error while processing {} ({}): {}", label, url, e);
                    }
                    Err(e) => return Err(e),
                }
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&media)?);
            } else {
                for item in &media {
                    let availability = if item.available {
                        "available".to_string()
                    } else {
                        format!("from {}", item.availability_date)
                    };
                    println!(
                        "{:>10}  {:<9}  {}  ({})",
                        item.id(),
                        item.format,
                        item.title,
                        availability
                    );
                }
            }
        }

        Command::Login => {
            let client = http::create_async_client(&config.http)?;
            let session =
                LibrarySession::new(client, &config.http.base_url, config.credentials.clone())?;
            let outcome = session.login().await;
            if !outcome.is_success() {
                return Err(AppError::Login(format!("{outcome:?}")));
            }
            log::info!("Logged in as {}", config.credentials.username);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config OK ({} catalog url(s))", config.urls.len());

            if let Some(path) = &config.general.auto_rent_keywords_path {
                let filter = KeywordFilter::load(path)?;
                log::info!(
                    "✓ Keyword file OK ({} keyword(s)) at {}",
                    filter.keywords().len(),
                    path.display()
                );
            }
            if config.reservation.enabled {
                log::info!("Auto-reserve is enabled");
            }

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
