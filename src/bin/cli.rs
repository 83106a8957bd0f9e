//! Film Crawler CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use film_crawler::{
    browser::{Browser, ChromeBrowser},
    config::load_config,
    error::Result,
    models::{Config, Sink},
    pipeline,
    services::FieldExtractor,
    storage::{FilmTable, FlatFile, StorageRouter},
    utils::http::{self, HttpPosterSource},
};

/// Film Crawler - film metadata from a movie catalogue
#[derive(Parser, Debug)]
#[command(
    name = "film-crawler",
    version,
    about = "Browser-driven film metadata crawler"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "crawler.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape every film on a range of listing pages
    Crawl {
        /// First listing page (overrides catalogue.start_page)
        #[arg(long)]
        start_page: Option<u32>,

        /// Number of listing pages (overrides catalogue.page_count)
        #[arg(long)]
        pages: Option<u32>,

        /// Enabled sink, repeatable (overrides storage.sinks)
        #[arg(long = "sink", value_name = "SINK")]
        sinks: Vec<Sink>,

        /// Show the browser window
        #[arg(long)]
        headed: bool,
    },

    /// Scrape a single film detail page
    Film {
        /// Detail page URL, e.g. https://letterboxd.com/film/ratatouille/
        url: String,
    },

    /// Validate the configuration file
    Validate,

    /// Show configured sinks and what they hold
    Info,
}

/// Initialize logging based on verbosity flag and the configured level.
fn init_logging(verbose: bool, config_path: &Path) {
    let level = if verbose {
        "debug".to_string()
    } else {
        Config::load(config_path)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string())
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

async fn open_router(config: &Config) -> Result<StorageRouter> {
    let client = http::create_async_client(&config.browser, &config.storage)?;
    StorageRouter::from_config(&config.storage, Box::new(HttpPosterSource::new(client))).await
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, &cli.config);

    log::info!("Film crawler starting...");
    let mut config = load_config(&cli.config)?;

    match cli.command {
        Command::Crawl {
            start_page,
            pages,
            sinks,
            headed,
        } => {
            if let Some(start_page) = start_page {
                config.catalogue.start_page = start_page;
            }
            if let Some(pages) = pages {
                config.catalogue.page_count = pages;
            }
            if !sinks.is_empty() {
                config.storage.sinks = sinks.into_iter().collect();
            }
            if headed {
                config.browser.headless = false;
            }
            config.validate()?;

            let router = open_router(&config).await?;
            let browser = ChromeBrowser::launch(&config.browser).await?;
            let summary = pipeline::run_session(&config, browser, router).await?;
            summary.log();

            log::info!("Crawl complete!");
        }

        Command::Film { url } => {
            let router = open_router(&config).await?;
            let browser = ChromeBrowser::launch(&config.browser).await?;

            let extractor = FieldExtractor::new(&browser, &config);
            let result = pipeline::scrape_film(&extractor, &router, &url).await;
            let browser_closed = browser.close().await;
            router.close()?;
            browser_closed?;

            let report = result?;
            for (sink, status) in &report.results {
                log::info!("{}: {}", sink, status);
            }
            if !report.is_complete() {
                log::warn!("{} was not written to every sink", report.identifier);
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            // load_config already validated; report what was checked.
            log::info!("✓ Catalogue: {}", config.catalogue.listing_url(config.catalogue.start_page));
            log::info!("✓ Selectors parse");
            log::info!("✓ Sinks: {}", config.storage.sinks);
            log::info!("All validations passed!");
        }

        Command::Info => {
            let storage = &config.storage;
            log::info!("Config file: {}", cli.config.display());
            log::info!(
                "Listing: {} ({} page(s) from {})",
                config.catalogue.listing_url(config.catalogue.start_page),
                config.catalogue.page_count,
                config.catalogue.start_page
            );
            log::info!("Sinks: {}", storage.sinks);

            if storage.sinks.needs_local_artifacts() {
                log::info!("Raw data directory: {}", storage.raw_data_dir.display());
            }
            if storage.sinks.contains(Sink::ObjectStore) {
                log::info!("Bucket: s3://{}/{}", storage.bucket, storage.prefix);
            }
            if storage.sinks.contains(Sink::RelationalTable) {
                if storage.database_path.exists() {
                    let table = FilmTable::open(&storage.database_path)?;
                    log::info!(
                        "Films in {}: {}",
                        storage.database_path.display(),
                        table.count()?
                    );
                    table.close()?;
                } else {
                    log::info!("No database at {} yet.", storage.database_path.display());
                }
            }
            if storage.sinks.contains(Sink::FlatFile) {
                let rows = FlatFile::new(&storage.csv_path).count_rows()?;
                log::info!("Rows in {}: {}", storage.csv_path.display(), rows);
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
