use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use newsdesk::config::Config;
use newsdesk::content::{NewsOrder, NewsQuery, NewsStore};
use newsdesk::feed::export::{render_rss, ChannelInfo};
use newsdesk::feed::{FeedFetcher, FeedImporter, FeedStore};
use newsdesk::server::Server;
use newsdesk::settings::SettingsStore;
use newsdesk::storage::Database;

#[derive(Parser)]
#[command(
    name = "newsdesk",
    version,
    about = "News publishing engine with RSS ingestion and engagement analytics",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); environment variables used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server
    Serve,

    /// Fetch one subscribed feed and import its new items
    Fetch {
        /// Feed id to fetch
        #[arg(short, long)]
        feed: i64,
    },

    /// Fetch all feeds that are due (or every active feed with --all)
    FetchAll {
        /// Ignore fetch schedules and fetch every active feed
        #[arg(long, default_value = "false")]
        all: bool,
    },

    /// Write the site's RSS 2.0 feed to a file or stdout
    Export {
        /// Restrict to one category id
        #[arg(short = 'C', long)]
        category: Option<i64>,

        /// Maximum number of articles
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output file path (stdout when absent)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    config.validate()?;

    match cli.command {
        Commands::Serve => {
            tracing::info!(
                host = %config.server.host,
                port = %config.server.port,
                "starting server"
            );
            Server::new(config)?.run().await?;
        }

        Commands::Fetch { feed } => {
            let importer = build_importer(&config)?;
            let outcome = importer.fetch_one(feed).await?;
            println!(
                "Fetched feed {feed}: {} found, {} imported",
                outcome.items_found, outcome.items_imported
            );
        }

        Commands::FetchAll { all } => {
            let importer = build_importer(&config)?;
            let results = if all {
                importer.fetch_all().await?
            } else {
                importer.fetch_due().await?
            };

            for result in &results {
                match &result.outcome {
                    Ok(outcome) => println!(
                        "{}: {} found, {} imported",
                        result.feed_name, outcome.items_found, outcome.items_imported
                    ),
                    Err(error) => println!("{}: failed ({error})", result.feed_name),
                }
            }

            let failed = results.iter().filter(|r| r.outcome.is_err()).count();
            println!("{} feeds processed, {failed} failed", results.len());
        }

        Commands::Export {
            category,
            limit,
            output,
        } => {
            let db = Arc::new(Database::open(&config.database.path)?);
            let news = NewsStore::new(db.clone());
            let settings = SettingsStore::new(db);

            let site_name = settings
                .get("site_name")?
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_else(|| config.site.name.clone());

            let articles = news.list(&NewsQuery {
                effectively_published: true,
                category_ids: category.into_iter().collect(),
                order: NewsOrder::Latest,
                limit: Some(limit),
                ..Default::default()
            })?;

            let xml = render_rss(
                &ChannelInfo {
                    title: site_name.clone(),
                    description: format!("Latest news from {site_name}"),
                    link: config.site.base_url.clone(),
                },
                &articles,
            );

            match output {
                Some(path) => {
                    std::fs::write(&path, xml)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Wrote {} articles to {}", articles.len(), path.display());
                }
                None => println!("{xml}"),
            }
        }
    }

    Ok(())
}

fn build_importer(config: &Config) -> Result<FeedImporter> {
    let db = Arc::new(Database::open(&config.database.path)?);
    let fetcher = FeedFetcher::with_timeout(
        config.fetch.rate_limit,
        config.fetch.user_agent.clone(),
        config.fetch.timeout(),
    )
    .context("failed to build feed fetcher")?;

    Ok(FeedImporter::new(
        FeedStore::new(db.clone()),
        NewsStore::new(db),
        fetcher,
        config.fetch.import_author_id,
    ))
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("newsdesk=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("newsdesk=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
