//! Error types for feed fetching and parsing
//!
//! This module defines the error types used by the RSS ingestion pipeline.

use thiserror::Error;

/// Errors that can occur while fetching a remote feed
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP error: status {0}")]
    Status(u16),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),
}

/// Errors that can occur while parsing feed XML
#[derive(Error, Debug)]
pub enum FeedParseError {
    /// The payload is not well-formed XML
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// Well-formed XML, but neither an RSS `channel` nor an Atom `entry` shape
    #[error("Not a valid RSS or Atom feed")]
    UnsupportedFormat,
}
