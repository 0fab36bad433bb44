//! Wire transport for event delivery
//!
//! The dispatcher hands each transport a fully form-encoded body. Anything
//! that can POST a form can stand in for `HttpTransport`, which is how
//! tests observe deliveries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};

use crate::error::{Error, Result};

/// Something that can POST a form body to a URL
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one form-encoded body
    async fn send(&self, url: &str, form_body: String) -> Result<()>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30)).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            Self {
                http_client: reqwest::Client::new(),
            }
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, url: &str, form_body: String) -> Result<()> {
        let response = self
            .http_client
            .post(url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
            .body(form_body)
            .send()
            .await?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Dispatch(format!("API error ({}): {}", status, error_text)))
        }
    }
}

/// Build an `application/x-www-form-urlencoded` body
pub fn encode_form(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", urlencoding::encode(key), urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
