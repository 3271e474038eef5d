//! Server wiring and shared application state

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::ads::AdStore;
use crate::config::Config;
use crate::content::NewsStore;
use crate::engagement::{CommentStore, ReactionStore, ViewStore};
use crate::feed::{FeedFetcher, FeedImporter, FeedStore};
use crate::media::MediaStore;
use crate::settings::SettingsStore;
use crate::storage::Database;
use crate::taxonomy::{CategoryStore, TagStore};

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub categories: CategoryStore,
    pub tags: TagStore,
    pub news: NewsStore,
    pub comments: CommentStore,
    pub reactions: ReactionStore,
    pub views: ViewStore,
    pub media: MediaStore,
    pub ads: AdStore,
    pub feeds: FeedStore,
    pub settings: SettingsStore,
    pub importer: Arc<FeedImporter>,

    /// Server start time
    pub start_time: Instant,

    /// Configuration
    pub config: Config,
}

impl AppState {
    /// Build the full store set over one database handle
    pub fn new(db: Arc<Database>, config: Config) -> Result<Self> {
        let settings = SettingsStore::new(db.clone());
        let feeds = FeedStore::new(db.clone());
        let news = NewsStore::new(db.clone());

        let fetcher = FeedFetcher::with_timeout(
            config.fetch.rate_limit,
            config.fetch.user_agent.clone(),
            config.fetch.timeout(),
        )
        .context("failed to build feed fetcher")?;

        let importer = Arc::new(FeedImporter::new(
            feeds.clone(),
            news.clone(),
            fetcher,
            config.fetch.import_author_id,
        ));

        Ok(Self {
            categories: CategoryStore::new(db.clone()),
            tags: TagStore::new(db.clone()),
            news,
            comments: CommentStore::new(db.clone(), settings.clone()),
            reactions: ReactionStore::new(db.clone()),
            views: ViewStore::new(db.clone()),
            media: MediaStore::new(db.clone()),
            ads: AdStore::new(db),
            feeds,
            settings,
            importer,
            start_time: Instant::now(),
            config,
        })
    }
}

// ============================================================================
// Server
// ============================================================================

/// The HTTP server
pub struct Server {
    state: AppState,
}

impl Server {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let db = Arc::new(Database::open(&config.database.path)?);
        let state = AppState::new(db, config)?;
        state.settings.initialize_defaults()?;

        Ok(Self { state })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the router with all routes and middleware
    pub fn build_router(&self) -> Router {
        super::api::create_router(self.state.clone())
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until shutdown
    pub async fn run(self) -> Result<()> {
        let addr: SocketAddr = format!(
            "{}:{}",
            self.state.config.server.host, self.state.config.server.port
        )
        .parse()
        .context("invalid server bind address")?;

        let router = self.build_router();

        tracing::info!(%addr, "newsdesk server listening");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind server address")?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
