//! Exchange HTTP Client - Rate-limited REST Client
//!
//! Wraps reqwest with a concurrency cap, a request-rate limiter and
//! uniform error decoding for exchange REST APIs. Never retries: retry
//! policy belongs to the caller.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::error::FeedError;

/// Turns an error response body into an exchange-reported error, if the
/// body carries one.
pub type ErrorDecoder = fn(&str) -> Option<FeedError>;

/// Configuration shared by every exchange REST client.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum in-flight requests per exchange.
    pub max_concurrent: usize,
    /// Sustained request rate per exchange.
    pub requests_per_second: u32,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_concurrent: 8,
            requests_per_second: 10,
        }
    }
}

/// Rate-limited JSON GET client bound to one exchange's base URL.
pub struct RestClient {
    /// Exchange name for logs and errors.
    exchange: &'static str,
    /// Underlying HTTP client.
    http: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Concurrency limiter.
    semaphore: Arc<Semaphore>,
    /// Request-rate limiter.
    limiter: DefaultDirectRateLimiter,
    /// Exchange-specific error body decoder.
    decode_error: ErrorDecoder,
}

impl RestClient {
    /// Create a client for `base_url`.
    pub fn new(
        exchange: &'static str,
        base_url: &str,
        settings: &HttpSettings,
        decode_error: ErrorDecoder,
    ) -> Result<Self, FeedError> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| FeedError::Network(format!("failed to build HTTP client: {e}")))?;

        let rate = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            exchange,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            semaphore: Arc::new(Semaphore::new(settings.max_concurrent.max(1))),
            limiter: RateLimiter::direct(Quota::per_second(rate)),
            decode_error,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with `query` and decode the JSON body.
    ///
    /// Non-2xx responses become `FeedError::Exchange` when the body carries
    /// the exchange's own error, otherwise `FeedError::Http`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FeedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FeedError::Network("request limiter closed".to_string()))?;
        self.limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        debug!(exchange = self.exchange, %url, "GET");

        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let err = self.error_from(status, &body);
            warn!(exchange = self.exchange, %url, error = %err, "REST request failed");
            return Err(err);
        }

        serde_json::from_str(&body).map_err(|e| {
            FeedError::Decode(format!("{} {path}: {e}", self.exchange))
        })
    }

    /// Classify a failed response.
    fn error_from(&self, status: StatusCode, body: &str) -> FeedError {
        (self.decode_error)(body).unwrap_or_else(|| FeedError::Http {
            status: status.as_u16(),
            message: status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_body_errors(_: &str) -> Option<FeedError> {
        None
    }

    fn always_exchange(body: &str) -> Option<FeedError> {
        Some(FeedError::Exchange {
            exchange: "test",
            code: 1,
            message: body.to_string(),
        })
    }

    #[test]
    fn test_base_url_is_trimmed() {
        let client = RestClient::new(
            "test",
            "https://api.example.com/",
            &HttpSettings::default(),
            no_body_errors,
        )
        .unwrap();
        assert_eq!(client.base_url(), "https://api.example.com");
    }

    #[test]
    fn test_error_falls_back_to_http_status() {
        let client =
            RestClient::new("test", "http://x", &HttpSettings::default(), no_body_errors).unwrap();
        match client.error_from(StatusCode::BAD_GATEWAY, "<html>") {
            FeedError::Http { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_prefers_exchange_message() {
        let client =
            RestClient::new("test", "http://x", &HttpSettings::default(), always_exchange).unwrap();
        let err = client.error_from(StatusCode::BAD_REQUEST, "Invalid symbol.");
        assert!(err.to_string().contains("Invalid symbol."));
    }

    #[test]
    fn test_zero_rate_is_clamped() {
        let settings = HttpSettings {
            requests_per_second: 0,
            max_concurrent: 0,
            ..HttpSettings::default()
        };
        assert!(RestClient::new("test", "http://x", &settings, no_body_errors).is_ok());
    }
}
