use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::http::{check_base_url, read_limited_text, ReadError};
use crate::config::Config;
use crate::util::null_as_default;

const MAX_RESPONSE_SIZE: usize = 5 * 1024 * 1024; // 5MB

/// Categories offered for browsing, in display order.
pub const CATEGORIES: &[&str] = &[
    "General",
    "Technology",
    "Sports",
    "Business",
    "Entertainment",
    "Health",
    "Science",
];

pub const DEFAULT_CATEGORY: &str = "General";

// ============================================================================
// Data Model
// ============================================================================

/// A news article as returned by the API. `url` is its only stable identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "urlToImage", default)]
    pub url_to_image: Option<String>,
    pub url: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Body of a successful headlines or search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub articles: Vec<Article>,
}

/// Error body the API returns alongside 4xx/5xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("No news API key configured (set NEWS_API_KEY or news_api_key in config.toml)")]
    MissingApiKey,
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("News API error ({code}): {message}")]
    Api { code: String, message: String },
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid UTF-8 in response")]
    InvalidUtf8,
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

impl From<ReadError> for NewsError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Network(e) => NewsError::Network(e.without_url()),
            ReadError::TooLarge(limit) => NewsError::ResponseTooLarge(limit),
            ReadError::InvalidUtf8 => NewsError::InvalidUtf8,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Client for a newsapi.org-compatible service.
pub struct NewsClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<SecretString>,
    country: String,
    timeout: Duration,
}

impl NewsClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: Option<SecretString>,
        country: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NewsError> {
        let base_url = check_base_url(base_url).map_err(|_| NewsError::InsecureBaseUrl)?;
        Ok(Self {
            http,
            base_url,
            api_key,
            country: country.into(),
            timeout,
        })
    }

    pub fn from_config(http: reqwest::Client, config: &Config) -> Result<Self, NewsError> {
        Self::new(
            http,
            &config.news_base_url,
            config.news_api_key(),
            config.country.clone(),
            config.request_timeout(),
        )
    }

    /// Top headlines for one category in the configured country.
    ///
    /// The category is lower-cased before it is sent.
    pub async fn top_headlines(&self, category: &str) -> Result<NewsResponse, NewsError> {
        let category = category.to_lowercase();
        tracing::debug!(category = %category, country = %self.country, "Fetching top headlines");
        self.get(
            "v2/top-headlines",
            &[("country", self.country.as_str()), ("category", category.as_str())],
        )
        .await
    }

    /// Free-text search across all articles. The query is sent unchanged.
    pub async fn search(&self, query: &str) -> Result<NewsResponse, NewsError> {
        tracing::debug!(query = %query, "Searching news");
        self.get("v2/everything", &[("q", query)]).await
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<NewsResponse, NewsError> {
        let key = self.api_key.as_ref().ok_or(NewsError::MissingApiKey)?;

        let mut url = self
            .base_url
            .join(path)
            .map_err(|_| NewsError::InsecureBaseUrl)?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in params {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("apiKey", key.expose_secret());
        }

        // The timeout covers the body as well as the headers
        let fetch = async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| NewsError::Network(e.without_url()))?;
            let status = response.status();
            let body = read_limited_text(response, MAX_RESPONSE_SIZE).await?;
            Ok::<_, NewsError>((status, body))
        };
        let (status, body) = tokio::time::timeout(self.timeout, fetch)
            .await
            .map_err(|_| NewsError::Timeout(self.timeout.as_secs()))??;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                if let Some(message) = err.message {
                    return Err(NewsError::Api {
                        code: err.code.unwrap_or_else(|| status.as_u16().to_string()),
                        message,
                    });
                }
            }
            return Err(NewsError::HttpStatus(status.as_u16()));
        }

        let parsed: NewsResponse = serde_json::from_str(&body)?;
        tracing::debug!(path, count = parsed.articles.len(), "News response received");
        Ok(parsed)
    }
}
