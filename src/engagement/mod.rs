//! Reader engagement: threaded comments, reactions and view analytics
//!
//! - [`comments`] - moderated comment threads with denormalized reply counts
//! - [`likes`] - idempotent like/dislike toggling with one row per identity
//! - [`views`] - append-only view events with device classification

pub mod comments;
pub mod likes;
pub mod views;

pub use comments::{Comment, CommentStore, NewComment};
pub use likes::{ReactionChange, ReactionCounts, ReactionStore};
pub use views::{DeviceInfo, NewsView, ViewContext, ViewStats, ViewStore};
