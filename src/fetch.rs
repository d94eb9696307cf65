//! Page fetching for the batch driver
//!
//! Non-success statuses are not errors here: they are handed over as is and
//! rejected at the extraction boundary.

use reqwest::{Client, Proxy};
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::document::FetchedPage;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.102 Safari/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timeout fetching {0}")]
    Timeout(String),

    #[error("http error for {url}: {reason}")]
    Http { url: String, reason: String },

    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Outbound proxy for every fetch, read from `PROXY_HOST`, `PROXY_USERNAME`
/// and `PROXY_PASSWORD`
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `host:port` or a full proxy URL; `http://` is assumed without a scheme
    pub host: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ProxyConfig {
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `None` when no proxy host is set
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Some(Self {
            host: non_empty("PROXY_HOST")?,
            username: non_empty("PROXY_USERNAME"),
            password: non_empty("PROXY_PASSWORD"),
        })
    }

    pub fn url(&self) -> String {
        if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("http://{}", self.host)
        }
    }

    pub fn to_proxy(&self) -> Result<Proxy, FetchError> {
        let proxy = Proxy::all(self.url())
            .map_err(|e| FetchError::Client(format!("invalid proxy {}: {}", self.host, e)))?;
        Ok(match &self.username {
            Some(username) => proxy.basic_auth(username, self.password.as_deref().unwrap_or_default()),
            None => proxy,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        proxy: Option<&ProxyConfig>,
    ) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5));

        if let Some(proxy) = proxy {
            debug!(host = %proxy.host, auth = proxy.username.is_some(), "fetching through proxy");
            builder = builder.proxy(proxy.to_proxy()?);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        debug!(url, "fetching page");

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status_code = response.status().as_u16();
        let raw_markup = response.text().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url, status_code, bytes = raw_markup.len(), "fetched page");
        Ok(FetchedPage {
            url: url.to_string(),
            status_code,
            raw_markup,
        })
    }
}
