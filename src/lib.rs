//! newsdesk - News publishing engine
//!
//! A content engine for a news-publishing site: article lifecycle and
//! queries, category/tag taxonomy, threaded comments and reactions, view
//! analytics, RSS ingestion and export, advertisement placement, and typed
//! site settings.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`models`] - Shared domain enums and identity types
//! - [`storage`] - SQLite persistence layer
//! - [`taxonomy`] - Category hierarchy and tags
//! - [`content`] - Article lifecycle and query engine
//! - [`engagement`] - Comments, reactions and view analytics
//! - [`media`] - Uploaded-file metadata registry
//! - [`ads`] - Advertisement placement and metrics
//! - [`feed`] - RSS ingestion pipeline and export
//! - [`settings`] - Typed key/value settings with caching
//! - [`server`] - HTTP API
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use newsdesk::config::Config;
//! use newsdesk::server::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = Server::new(config)?;
//!     server.run().await
//! }
//! ```

pub mod ads;
pub mod config;
pub mod content;
pub mod engagement;
pub mod error;
pub mod feed;
pub mod media;
pub mod models;
pub mod server;
pub mod settings;
pub mod storage;
pub mod taxonomy;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::content::{News, NewsStore};
    pub use crate::error::{Error, ErrorCategory, Result};
    pub use crate::models::{
        Actor, CommentAuthor, CommentStatus, FeedStatus, Identity, NewsStatus, ReactionKind, Role,
    };
    pub use crate::storage::Database;
}

// Direct re-exports for convenience
pub use error::{Error, Result};
pub use models::{Actor, Identity, NewsStatus};
