//! Web pages, fetched through an ordered chain of strategies.
//!
//! The default chain asks a text-extraction proxy first and falls back to a
//! direct GET. Each attempt is bounded by the configured timeout. When every
//! strategy fails, the caller gets one error listing every attempt.

use std::{fmt, time::Duration};

use async_trait::async_trait;
use scraper::{Html, Selector};
use url::Url;

use crate::{Config, source::SourceError};

const USER_AGENT: &str = concat!("grc-import/", env!("CARGO_PKG_VERSION"));
const TITLE_LIMIT: usize = 200;

/// Content returned by a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageContent {
    /// Plain (or Markdown-ish) text.
    Text(String),
    /// Raw HTML.
    Html(String),
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// The normalized URL that was fetched.
    pub url: Url,
    /// Page content.
    pub content: PageContent,
    /// Best-effort page title.
    pub title: Option<String>,
    /// Name of the strategy that succeeded.
    pub strategy: &'static str,
}

/// One failed attempt within a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchAttempt {
    /// Strategy name.
    pub strategy: &'static str,
    /// Why it failed.
    pub error: String,
}

impl FetchAttempt {
    pub(crate) fn join(attempts: &[Self]) -> String {
        if attempts.is_empty() {
            return "no fetch strategies configured".to_string();
        }
        attempts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for FetchAttempt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.strategy, self.error)
    }
}

/// Failure of a single strategy.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport-level failure, including timeouts.
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),
    /// The response carried no usable content.
    #[error("empty response")]
    Empty,
    /// The strategy could not build its request URL.
    #[error("invalid request URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A way of turning a URL into page content.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    /// Name shown in diagnostics.
    fn name(&self) -> &'static str;

    /// Fetches the page.
    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError>;
}

/// Asks a text-extraction proxy for a readable rendition of the page.
///
/// The target URL is appended verbatim to the proxy base URL.
#[derive(Debug, Clone)]
pub struct ReaderProxy {
    client: reqwest::Client,
    base: String,
}

impl ReaderProxy {
    /// Creates a proxy strategy rooted at `base`.
    #[must_use]
    pub fn new(client: reqwest::Client, base: impl Into<String>) -> Self {
        Self {
            client,
            base: base.into(),
        }
    }
}

#[async_trait]
impl FetchStrategy for ReaderProxy {
    fn name(&self) -> &'static str {
        "reader-proxy"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let request = Url::parse(&format!("{}{url}", self.base))?;
        let response = self.client.get(request).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Err(FetchError::Empty);
        }

        Ok(FetchedPage {
            url: url.clone(),
            title: first_line_title(&text),
            content: PageContent::Text(text),
            strategy: self.name(),
        })
    }
}

/// Fetches the page itself.
#[derive(Debug, Clone)]
pub struct DirectFetch {
    client: reqwest::Client,
}

impl DirectFetch {
    /// Creates a direct strategy.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for DirectFetch {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn fetch(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let is_plain_text = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/plain"));
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::Empty);
        }

        let (content, title) = if is_plain_text {
            let title = first_line_title(&body);
            (PageContent::Text(body), title)
        } else {
            let title = html_title(&body);
            (PageContent::Html(body), title)
        };

        Ok(FetchedPage {
            url: url.clone(),
            content,
            title,
            strategy: self.name(),
        })
    }
}

/// Runs fetch strategies in order until one succeeds.
pub struct Fetcher {
    strategies: Vec<Box<dyn FetchStrategy>>,
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.strategies.iter().map(|strategy| strategy.name()))
            .finish()
    }
}

impl Fetcher {
    /// Creates a fetcher from an explicit strategy chain.
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn FetchStrategy>>) -> Self {
        Self { strategies }
    }

    /// The default chain: reader proxy, then direct.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = http_client(config.fetch_timeout())?;
        Ok(Self::new(vec![
            Box::new(ReaderProxy::new(client.clone(), config.reader_proxy_url())),
            Box::new(DirectFetch::new(client)),
        ]))
    }

    /// Normalizes `input` and fetches it.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidUrl`] if the input is not a URL and
    /// [`SourceError::FetchFailed`] if every strategy failed.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, input: &str) -> Result<FetchedPage, SourceError> {
        let url = normalize_url(input)?;
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            match strategy.fetch(&url).await {
                Ok(page) => {
                    tracing::debug!(strategy = strategy.name(), "fetched page");
                    return Ok(page);
                }
                Err(error) => {
                    tracing::debug!(strategy = strategy.name(), %error, "fetch attempt failed");
                    attempts.push(FetchAttempt {
                        strategy: strategy.name(),
                        error: error.to_string(),
                    });
                }
            }
        }

        Err(SourceError::FetchFailed {
            url: url.to_string(),
            attempts,
        })
    }
}

/// Builds the HTTP client shared by the fetch strategies.
///
/// # Errors
///
/// Returns [`SourceError::Client`] if the TLS backend cannot be initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, SourceError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(SourceError::Client)
}

/// Parses a user-supplied URL, prefixing `https://` when no scheme is given.
///
/// # Errors
///
/// Returns [`SourceError::InvalidUrl`] for empty input, unparseable input or
/// a scheme other than HTTP(S).
pub fn normalize_url(input: &str) -> Result<Url, SourceError> {
    let trimmed = input.trim();
    let invalid = |reason: String| SourceError::InvalidUrl {
        input: input.to_string(),
        reason,
    };
    if trimmed.is_empty() {
        return Err(invalid("empty URL".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|e| invalid(e.to_string()))?;

    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        "http" | "https" => Err(invalid("missing host".to_string())),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

fn first_line_title(text: &str) -> Option<String> {
    text.lines()
        .map(|line| line.trim().trim_start_matches('#').trim())
        .find(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_prefix("Title:").map_or(line, str::trim);
            line.chars().take(TITLE_LIMIT).collect()
        })
}

fn html_title(html: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(html);
    let title = document.select(&selector).next()?.text().collect::<String>();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then(|| title.chars().take(TITLE_LIMIT).collect())
}
