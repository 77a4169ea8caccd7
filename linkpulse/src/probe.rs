use crate::config::ProbeConfig;
use crate::message::LinkState;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, redirect};

/// Capability classifying a URL as available or unavailable.
///
/// Implementations never fail: every error is folded into
/// `LinkState::Unavailable`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self, url: &str) -> LinkState;
}

/// 2xx and 3xx count as available, anything else does not.
pub fn classify(status: StatusCode) -> LinkState {
    if status.is_success() || status.is_redirection() {
        LinkState::Available
    } else {
        LinkState::Unavailable
    }
}

/// Probe issuing one HEAD request per check.
///
/// A chain fails once it reaches `max_redirects` redirects, so at most
/// `max_redirects - 1` are followed. The failure is a transport error and
/// therefore `Unavailable`.
pub struct HttpProbe {
    client: reqwest::Client,
}

// `previous()` holds every URL requested so far in the chain, the first one
// included, so its length equals the number of the redirect being attempted.
fn redirect_policy(max_redirects: usize) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= max_redirects {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

impl HttpProbe {
    pub fn new(config: &ProbeConfig) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .timeout(config.timeout)
            .redirect(redirect_policy(config.max_redirects))
            .pool_max_idle_per_host(0)
            .build()
            .context("Failed to build reqwest client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self, url: &str) -> LinkState {
        match self.client.head(url).send().await {
            Ok(response) => {
                let state = classify(response.status());
                tracing::debug!(url, status = %response.status(), %state, "probe finished");
                state
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "timeout"
                } else if e.is_redirect() {
                    "too many redirects"
                } else if e.is_connect() {
                    "connect"
                } else if e.is_builder() {
                    "invalid url"
                } else {
                    "transport"
                };
                tracing::debug!(url, reason, error = %e, "probe failed");
                LinkState::Unavailable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{Expectation, Server, matchers::*, responders};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn probe(timeout: Duration) -> HttpProbe {
        HttpProbe::new(&ProbeConfig {
            timeout,
            max_redirects: 5,
        })
        .expect("Failed to create probe for test")
    }

    async fn check_status(status: u16) -> LinkState {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/"))
                .respond_with(responders::status_code(status)),
        );
        probe(Duration::from_secs(5))
            .check(&server.url_str("/"))
            .await
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(StatusCode::OK), LinkState::Available);
        assert_eq!(classify(StatusCode::NO_CONTENT), LinkState::Available);
        assert_eq!(classify(StatusCode::MOVED_PERMANENTLY), LinkState::Available);
        assert_eq!(classify(StatusCode::NOT_MODIFIED), LinkState::Available);
        assert_eq!(classify(StatusCode::CONTINUE), LinkState::Unavailable);
        assert_eq!(classify(StatusCode::NOT_FOUND), LinkState::Unavailable);
        assert_eq!(
            classify(StatusCode::INTERNAL_SERVER_ERROR),
            LinkState::Unavailable
        );
    }

    #[tokio::test]
    async fn test_ok_is_available() {
        assert_eq!(check_status(200).await, LinkState::Available);
    }

    #[tokio::test]
    async fn test_redirect_without_location_is_available() {
        assert_eq!(check_status(304).await, LinkState::Available);
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() {
        assert_eq!(check_status(404).await, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        assert_eq!(check_status(503).await, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_followed_redirect_is_available() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/old")).respond_with(
                responders::status_code(301).insert_header("Location", "/new"),
            ),
        );
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/new"))
                .respond_with(responders::status_code(200)),
        );

        let state = probe(Duration::from_secs(5))
            .check(&server.url_str("/old"))
            .await;
        assert_eq!(state, LinkState::Available);
    }

    // Serves /hop/0 -> /hop/1 -> ... -> /hop/{hops} with a 200 at the end.
    fn redirect_chain(server: &Server, hops: usize) {
        for i in 0..hops {
            server.expect(
                Expectation::matching(request::method_path("HEAD", format!("/hop/{i}")))
                    .times(..)
                    .respond_with(
                        responders::status_code(302)
                            .insert_header("Location", format!("/hop/{}", i + 1)),
                    ),
            );
        }
        server.expect(
            Expectation::matching(request::method_path("HEAD", format!("/hop/{hops}")))
                .times(..)
                .respond_with(responders::status_code(200)),
        );
    }

    #[tokio::test]
    async fn test_four_redirects_are_followed() {
        let server = Server::run();
        redirect_chain(&server, 4);

        let state = probe(Duration::from_secs(5))
            .check(&server.url_str("/hop/0"))
            .await;
        assert_eq!(state, LinkState::Available);
    }

    #[tokio::test]
    async fn test_fifth_redirect_is_unavailable() {
        let server = Server::run();
        redirect_chain(&server, 5);

        let state = probe(Duration::from_secs(5))
            .check(&server.url_str("/hop/0"))
            .await;
        assert_eq!(state, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_redirect_loop_is_unavailable() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/loop"))
                .times(..)
                .respond_with(responders::status_code(302).insert_header("Location", "/loop")),
        );

        let state = probe(Duration::from_secs(5))
            .check(&server.url_str("/loop"))
            .await;
        assert_eq!(state, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("HEAD", "/")).respond_with(
                responders::delay_and_then(
                    Duration::from_millis(200),
                    responders::status_code(200),
                ),
            ),
        );

        let state = probe(Duration::from_millis(20))
            .check(&server.url_str("/"))
            .await;
        assert_eq!(state, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unavailable() {
        let state = probe(Duration::from_secs(5))
            .check("https://nonexistent.invalid")
            .await;
        assert_eq!(state, LinkState::Unavailable);
    }

    #[tokio::test]
    async fn test_malformed_url_is_unavailable() {
        let state = probe(Duration::from_secs(5)).check("not a url").await;
        assert_eq!(state, LinkState::Unavailable);
    }
}
