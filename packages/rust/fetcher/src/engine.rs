//! HTTP page fetcher with SSRF protection.
//!
//! Loads a single page over HTTP(S) and hands the body to [`extract_document`].

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument, warn};
use url::Url;

use curator_shared::{CuratorError, FetchConfig, Result};

use crate::FetchedDocument;
use crate::extract::{Selectors, extract_document};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("Curator/", env!("CARGO_PKG_VERSION"));

/// Maximum redirects followed per fetch.
const MAX_REDIRECTS: usize = 5;

// ---------------------------------------------------------------------------
// Collaborator trait
// ---------------------------------------------------------------------------

/// The page-fetch collaborator: one URL in, one title and body out.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Fetches pages with `reqwest` and extracts them with configured selectors.
pub struct HttpFetcher {
    client: Client,
    selectors: Selectors,
    /// Allow localhost/private IPs (for integration tests with mock servers).
    allow_private_hosts: bool,
}

impl HttpFetcher {
    /// Create a fetcher from the `[fetch]` config section.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CuratorError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            selectors: Selectors::from_config(config)?,
            allow_private_hosts: config.allow_private_hosts,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let parsed = Url::parse(url)
            .map_err(|e| CuratorError::validation(format!("invalid URL '{url}': {e}")))?;

        if !self.allow_private_hosts && is_ssrf_target(&parsed) {
            warn!(%parsed, "SSRF protection: blocked");
            return Err(CuratorError::validation(format!(
                "refusing to fetch non-public URL '{parsed}'"
            )));
        }

        debug!("fetching page");

        let response = self
            .client
            .get(parsed.as_str())
            .send()
            .await
            .map_err(|e| CuratorError::Network(format!("{parsed}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CuratorError::Network(format!("{parsed}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CuratorError::Network(format!("{parsed}: body read failed: {e}")))?;

        debug!(bytes = body.len(), "page loaded");
        extract_document(&body, &self.selectors)
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
fn is_ssrf_target(url: &Url) -> bool {
    // Block non-HTTP schemes
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> FetchConfig {
        FetchConfig {
            content_selector: "main".into(),
            allow_private_hosts: true,
            timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn ssrf_blocks_file_scheme() {
        let url = Url::parse("file:///etc/passwd").unwrap();
        assert!(is_ssrf_target(&url));
    }

    #[test]
    fn ssrf_blocks_private_ips() {
        for raw in [
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://[::1]/",
            "http://localhost:3000/api",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn ssrf_allows_public() {
        let url = Url::parse("https://en.wikisource.org/wiki/Page").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[tokio::test]
    async fn fetches_page_from_mock_server() {
        let server = wiremock::MockServer::start().await;
        let page = r#"<html><body>
            <h1 id="firstHeading">Page</h1>
            <main><p>Para1</p><p></p><p>Para2</p></main>
        </body></html>"#;

        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .and(wiremock::matchers::path("/page"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string(page))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let doc = fetcher
            .fetch(&format!("{}/page", server.uri()))
            .await
            .expect("fetch");

        assert_eq!(doc.title, "Page");
        assert_eq!(doc.body, "Para1\n\nPara2");
    }

    #[tokio::test]
    async fn http_error_status_fails() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/gone"))
            .respond_with(wiremock::ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(&test_config()).unwrap();
        let err = fetcher
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn private_hosts_blocked_by_default() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("http://127.0.0.1:9/page").await.unwrap_err();
        assert!(err.to_string().contains("non-public"));
    }

    #[tokio::test]
    async fn invalid_url_fails() {
        let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(err.to_string().contains("invalid URL"));
    }
}
