//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with an identifying user agent string
//! - Per-request timeouts taken from the [`FetchPolicy`]
//! - Classifying status codes and transport errors into [`FetchFailureKind`]s
//! - Recognising challenge pages served with a 200 status

use crate::config::UserAgentConfig;
use crate::fetch::{
    is_challenge_page, FetchFailure, FetchFailureKind, FetchPolicy, FetchPort, FetchedPage,
    WaitUntil,
};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use furrow::config::UserAgentConfig;
/// use furrow::fetch::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "FurrowBot".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`FetchPort`] backed by a reqwest [`Client`]
///
/// # Classification
///
/// | Condition | Kind |
/// |-----------|------|
/// | Request exceeded policy timeout | `Timeout` |
/// | HTTP 403, 429, 503 | `Blocked` |
/// | 2xx body containing a challenge marker | `Blocked` |
/// | Other 5xx, connection failures | `NetworkError` |
/// | Other 4xx, unfollowed 3xx | `Rejected` |
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    challenge_markers: Vec<String>,
}

impl HttpFetcher {
    pub fn new(
        user_agent: &UserAgentConfig,
        challenge_markers: Vec<String>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::with_client(
            build_http_client(user_agent)?,
            challenge_markers,
        ))
    }

    pub fn with_client(client: Client, challenge_markers: Vec<String>) -> Self {
        Self {
            client,
            challenge_markers,
        }
    }
}

#[async_trait]
impl FetchPort for HttpFetcher {
    async fn fetch(&self, url: &str, policy: &FetchPolicy) -> Result<FetchedPage, FetchFailure> {
        if policy.wait_until != WaitUntil::Load {
            tracing::trace!(
                "wait_until {:?} has no effect without a renderer",
                policy.wait_until
            );
        }

        let response = self
            .client
            .get(url)
            .timeout(policy.timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        let status = response.status();
        let final_url = response.url().to_string();

        if let Some(kind) = classify_status(status) {
            return Err(FetchFailure::new(
                kind,
                format!("HTTP {} for {}", status.as_u16(), url),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(url, &e))?;

        if is_challenge_page(&body, &self.challenge_markers) {
            return Err(FetchFailure::new(
                FetchFailureKind::Blocked,
                format!("challenge page served for {}", url),
            ));
        }

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

/// Maps a non-success status to a failure kind; `None` for 2xx
fn classify_status(status: StatusCode) -> Option<FetchFailureKind> {
    if status.is_success() {
        return None;
    }

    match status {
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE => {
            Some(FetchFailureKind::Blocked)
        }
        s if s.is_server_error() => Some(FetchFailureKind::NetworkError),
        _ => Some(FetchFailureKind::Rejected),
    }
}

fn classify_transport_error(url: &str, error: &reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::new(
            FetchFailureKind::Timeout,
            format!("request timeout for {}", url),
        )
    } else if error.is_connect() {
        FetchFailure::new(
            FetchFailureKind::NetworkError,
            format!("connection failed for {}: {}", url, error),
        )
    } else {
        FetchFailure::new(
            FetchFailureKind::NetworkError,
            format!("{}: {}", url, error),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config() -> UserAgentConfig {
        UserAgentConfig {
            crawler_name: "TestCrawler".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        }
    }

    fn create_test_fetcher() -> HttpFetcher {
        HttpFetcher::new(
            &create_test_config(),
            crate::fetch::DEFAULT_CHALLENGE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
        )
        .unwrap()
    }

    fn short_policy() -> FetchPolicy {
        FetchPolicy {
            wait_until: WaitUntil::Load,
            timeout: Duration::from_millis(300),
        }
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&create_test_config()).is_ok());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            Some(FetchFailureKind::Blocked)
        );
        assert_eq!(
            classify_status(StatusCode::FORBIDDEN),
            Some(FetchFailureKind::Blocked)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_GATEWAY),
            Some(FetchFailureKind::NetworkError)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Some(FetchFailureKind::Rejected)
        );
        assert_eq!(
            classify_status(StatusCode::GONE),
            Some(FetchFailureKind::Rejected)
        );
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/news/"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&server)
            .await;

        let url = format!("{}/news/", server.uri());
        let page = create_test_fetcher()
            .fetch(&url, &short_policy())
            .await
            .unwrap();

        assert_eq!(page.status, 200);
        assert_eq!(page.body, "<p>hello</p>");
        assert_eq!(page.final_url, url);
    }

    #[tokio::test]
    async fn test_fetch_challenge_page_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<title>Just a moment...</title><div id=\"challenge-running\">"),
            )
            .mount(&server)
            .await;

        let err = create_test_fetcher()
            .fetch(&server.uri(), &short_policy())
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Blocked);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = create_test_fetcher()
            .fetch(&server.uri(), &short_policy())
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Rejected);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = create_test_fetcher()
            .fetch(&server.uri(), &short_policy())
            .await
            .unwrap_err();
        assert_eq!(err.kind, FetchFailureKind::Timeout);
    }
}
