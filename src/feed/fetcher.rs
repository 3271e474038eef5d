//! Outbound HTTP for feed retrieval
//!
//! Fetches run with a bounded timeout and a process-wide rate limit toward
//! upstream hosts. Response bodies are decoded from the charset the server
//! declares, so feeds published in legacy encodings import cleanly.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::utils::error::FetchError;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Feed fetcher with rate limiting and charset-aware decoding
pub struct FeedFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// User agent sent to upstream hosts
    user_agent: String,
}

impl FeedFetcher {
    /// Create a fetcher with the default 30-second timeout
    pub fn new(requests_per_second: u32, user_agent: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_timeout(requests_per_second, user_agent, DEFAULT_TIMEOUT)
    }

    /// Create a fetcher with a custom timeout
    pub fn with_timeout(
        requests_per_second: u32,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).gzip(true).build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::new(1).unwrap());
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            user_agent: user_agent.into(),
        })
    }

    /// Fetch a feed body as text
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] when the URL does not parse
    /// - [`FetchError::Timeout`] when the request exceeds the timeout
    /// - [`FetchError::Status`] on any non-2xx response
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_charset);

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        Ok(decode_body(&bytes, charset.as_deref()))
    }
}

/// Pull the charset parameter out of a Content-Type header value
fn extract_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let mut parts = param.splitn(2, '=');
        let key = parts.next()?.trim();
        if key.eq_ignore_ascii_case("charset") {
            Some(parts.next()?.trim().trim_matches('"').to_string())
        } else {
            None
        }
    })
}

/// Decode a body using the declared charset, defaulting to UTF-8
fn decode_body(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .unwrap_or(encoding_rs::UTF_8);

    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_charset() {
        assert_eq!(
            extract_charset("application/rss+xml; charset=utf-8"),
            Some("utf-8".to_string())
        );
        assert_eq!(
            extract_charset("text/xml; charset=\"EUC-KR\""),
            Some("EUC-KR".to_string())
        );
        assert_eq!(extract_charset("application/xml"), None);
    }

    #[test]
    fn test_decode_body_utf8_default() {
        let text = decode_body("hello".as_bytes(), None);
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_decode_body_euc_kr() {
        // "뉴스" in EUC-KR
        let bytes = [0xB4, 0xBA, 0xBD, 0xBA];
        let text = decode_body(&bytes, Some("euc-kr"));
        assert_eq!(text, "뉴스");
    }

    #[test]
    fn test_decode_body_unknown_charset_falls_back() {
        let text = decode_body("plain".as_bytes(), Some("no-such-charset"));
        assert_eq!(text, "plain");
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let fetcher = FeedFetcher::new(10, "test-agent").unwrap();
        let result = fetcher.fetch("definitely not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
