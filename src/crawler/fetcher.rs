//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester:
//! - Building one shared HTTP client
//! - GET requests with browser identity headers and a referer
//! - Identity rotation at a fixed request cadence
//! - Retries with exponential backoff for transient failures
//! - HEAD probes for image variants

use crate::config::{FetcherConfig, TargetConfig};
use crate::crawler::identity::BrowserIdentity;
use crate::crawler::retry::RetryPolicy;
use crate::FetchError;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, REFERER};
use reqwest::{redirect::Policy, Client};
use scraper::Html;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A successfully fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Decoded body
    pub body: String,
}

impl FetchedPage {
    /// Parses the body as an HTML document
    ///
    /// `Html` is not `Send`, so callers parse inside synchronous code and drop the
    /// document before the next await.
    pub fn document(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

/// Builds the HTTP client shared by page fetches, probes, and image downloads
///
/// Identity headers are attached per request, so the client has no default user
/// agent.
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Page fetcher with identity rotation and retries
///
/// All methods take `&self`; the request counter and the current identity use
/// interior mutability so retry closures and concurrent probes can share it.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    identity: Mutex<BrowserIdentity>,
    request_count: AtomicU64,
    rotate_every: u64,
    retry: RetryPolicy,
    default_referer: String,
    page_timeout: Duration,
    sitemap_timeout: Duration,
    head_timeout: Duration,
}

impl Fetcher {
    /// Creates a fetcher with a random starting identity
    ///
    /// # Arguments
    ///
    /// * `config` - Timeouts, retry policy, and rotation cadence
    /// * `target` - The site being harvested; its base URL is the default referer
    pub fn new(config: &FetcherConfig, target: &TargetConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
            identity: Mutex::new(BrowserIdentity::random()),
            request_count: AtomicU64::new(0),
            rotate_every: config.rotate_every.max(1),
            retry: RetryPolicy::from_config(config),
            default_referer: target.base_url.clone(),
            page_timeout: Duration::from_secs(config.timeout_secs),
            sitemap_timeout: Duration::from_secs(config.sitemap_timeout_secs),
            head_timeout: Duration::from_secs(config.head_timeout_secs),
        })
    }

    /// The underlying client, for spawned download tasks
    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn page_timeout(&self) -> Duration {
        self.page_timeout
    }

    /// Number of GET attempts issued so far
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Replaces the current identity with one using another user agent
    pub fn rotate_identity(&self) {
        if let Ok(mut current) = self.identity.lock() {
            let next = current.rotated();
            tracing::debug!("Rotating identity to {}", next.user_agent());
            *current = next;
        }
    }

    /// Headers of the current identity
    pub fn identity_headers(&self) -> HeaderMap {
        match self.identity.lock() {
            Ok(identity) => identity.headers().clone(),
            Err(poisoned) => poisoned.into_inner().headers().clone(),
        }
    }

    /// Fetches a page with retries
    ///
    /// # Arguments
    ///
    /// * `url` - The page to fetch
    /// * `referer` - Referer header; defaults to the site's base URL
    ///
    /// # Returns
    ///
    /// * `Ok(FetchedPage)` - A 2xx response and its body
    /// * `Err(FetchError::Exhausted)` - Every attempt failed
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<FetchedPage, FetchError> {
        let referer = referer.unwrap_or(&self.default_referer);
        self.retry
            .run(url, || self.get_once(url, referer, self.page_timeout))
            .await
    }

    /// Fetches a sitemap document, which may be large, with the longer timeout
    pub async fn fetch_sitemap(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let referer = self.default_referer.as_str();
        self.retry
            .run(url, || self.get_once(url, referer, self.sitemap_timeout))
            .await
    }

    /// Sends a HEAD request and returns the advertised size
    ///
    /// # Returns
    ///
    /// * `Some(size)` - The resource exists and declared a Content-Length
    /// * `None` - Non-2xx status, network failure, or no length header
    pub async fn head(&self, url: &str) -> Option<u64> {
        let response = match self
            .client
            .head(url)
            .headers(self.identity_headers())
            .timeout(self.head_timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("HEAD {} failed: {}", url, e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::trace!("HEAD {} returned {}", url, response.status());
            return None;
        }

        response
            .headers()
            .get(CONTENT_LENGTH)?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Issues a single GET attempt, rotating the identity on cadence
    async fn get_once(
        &self,
        url: &str,
        referer: &str,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let count = self.request_count.fetch_add(1, Ordering::Relaxed) + 1;
        if count % self.rotate_every == 0 {
            self.rotate_identity();
        }

        let response = self
            .client
            .get(url)
            .headers(self.identity_headers())
            .header(REFERER, referer)
            .timeout(timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        tracing::trace!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_config() -> FetcherConfig {
        FetcherConfig {
            max_attempts: 2,
            backoff_min_ms: 1,
            backoff_max_ms: 1,
            rotate_every: 2,
            ..FetcherConfig::default()
        }
    }

    fn target_for(server: &MockServer) -> TargetConfig {
        TargetConfig {
            base_url: server.uri(),
            ..TargetConfig::default()
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&FetcherConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_sends_default_referer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/products/lamp"))
            .and(header("referer", server.uri().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_string("<h1>ok</h1>"))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(), &target_for(&server)).unwrap();
        let page = fetcher
            .fetch(&format!("{}/products/lamp", server.uri()), None)
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert!(page.body.contains("ok"));
        assert_eq!(fetcher.request_count(), 1);
    }

    #[tokio::test]
    async fn test_fetch_retries_then_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(), &target_for(&server)).unwrap();
        let result = fetcher
            .fetch(&format!("{}/broken", server.uri()), Some("https://ref.example/"))
            .await;

        match result {
            Err(FetchError::Exhausted { attempts, .. }) => assert_eq!(attempts, 2),
            other => panic!("expected Exhausted, got {:?}", other.map(|p| p.status)),
        }
        assert_eq!(fetcher.request_count(), 2);
    }

    #[tokio::test]
    async fn test_head_reports_size() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1234]))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/missing.jpg"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = Fetcher::new(&fast_config(), &target_for(&server)).unwrap();
        assert_eq!(fetcher.head(&format!("{}/img.jpg", server.uri())).await, Some(1234));
        assert_eq!(fetcher.head(&format!("{}/missing.jpg", server.uri())).await, None);
    }

    #[test]
    fn test_document_parses_body() {
        let page = FetchedPage {
            url: "https://masonstores.com/products/x".to_string(),
            status: 200,
            body: "<html><body><h2 class=\"title-detail\">Lamp</h2></body></html>".to_string(),
        };
        let selector = scraper::Selector::parse("h2.title-detail").unwrap();
        let document = page.document();
        assert_eq!(document.select(&selector).count(), 1);
    }
}
