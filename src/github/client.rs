//! GraphQL client with layered retry handling.
//!
//! [`GraphQlClient::fetch`] performs a single query with the transport retry
//! ladder (HTTP-level 403/502 and connection failures).
//! [`GraphQlClient::execute`] wraps it with the payload ladder, which handles
//! 200 responses whose `errors` array signals GraphQL-level rate limiting.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::http::{HttpRequest, HttpTransport};
use crate::retry::{
    is_rate_limit_error, payload_backoff, transport_backoff, wait_from_graphql_error,
    wait_from_reset_epoch, PAYLOAD_MAX_ATTEMPTS, TRANSPORT_MAX_ATTEMPTS,
};

use super::error::GitHubError;
use super::queries::{self, Query};
use super::types::{RepoNode, Repository, Viewer};

const DEFAULT_ENDPOINT: &str = "https://api.github.com/graphql";
const USER_AGENT: &str = concat!("gitstats-sync/", env!("CARGO_PKG_VERSION"));

/// Client for the GitHub GraphQL endpoint.
///
/// Cloning is cheap; clones share the underlying transport.
#[derive(Clone)]
pub struct GraphQlClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    token: String,
}

impl GraphQlClient {
    pub fn new(token: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: token.into(),
        }
    }

    /// Override the endpoint URL, for GitHub Enterprise hosts.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_for(&self, rendered_query: &str) -> HttpRequest {
        let body = serde_json::json!({ "query": rendered_query }).to_string();
        HttpRequest {
            url: self.endpoint.clone(),
            headers: vec![
                ("authorization".to_string(), format!("bearer {}", self.token)),
                ("content-type".to_string(), "application/json".to_string()),
                ("user-agent".to_string(), USER_AGENT.to_string()),
            ],
            body: body.into_bytes(),
        }
    }

    /// Run one query through the transport retry ladder.
    ///
    /// 403 responses wait out the `x-ratelimit-reset` header when present;
    /// 403 without the header, 502, and connection errors back off
    /// exponentially. Any other non-200 status is fatal.
    pub async fn fetch(
        &self,
        query: Query,
        params: &[(&str, &str)],
        pagination: &str,
    ) -> Result<Value, GitHubError> {
        let rendered = queries::render(query, params, pagination);
        let mut last_error = String::new();

        for attempt in 0..TRANSPORT_MAX_ATTEMPTS {
            // No point sleeping after the final attempt has already failed.
            let retries_left = attempt + 1 < TRANSPORT_MAX_ATTEMPTS;

            let response = match self.transport.post(self.request_for(&rendered)).await {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    if retries_left {
                        let backoff = transport_backoff(attempt);
                        warn!(attempt, ?backoff, error = %e, "transport failure, backing off");
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            match response.status {
                200 => {
                    return serde_json::from_slice(&response.body)
                        .map_err(|e| GitHubError::decode(e.to_string()));
                }
                401 => return Err(GitHubError::Auth { status: 401 }),
                403 => {
                    last_error = "status 403".to_string();
                    if !retries_left {
                        continue;
                    }
                    let reset_wait = response
                        .header("x-ratelimit-reset")
                        .and_then(|h| wait_from_reset_epoch(h, Utc::now()));
                    match reset_wait {
                        Some(wait) => {
                            warn!(attempt, ?wait, "rate limited at transport level, waiting for reset");
                            tokio::time::sleep(wait).await;
                        }
                        None => {
                            let backoff = transport_backoff(attempt);
                            warn!(attempt, ?backoff, "got 403 without reset header, backing off");
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
                502 => {
                    last_error = "status 502".to_string();
                    if retries_left {
                        let backoff = transport_backoff(attempt);
                        warn!(attempt, ?backoff, "got 502, backing off");
                        tokio::time::sleep(backoff).await;
                    }
                }
                status => {
                    return Err(GitHubError::Fatal {
                        status,
                        body: String::from_utf8_lossy(&response.body).into_owned(),
                    });
                }
            }
        }

        Err(GitHubError::RetryBudgetExhausted {
            attempts: TRANSPORT_MAX_ATTEMPTS,
            last_error,
        })
    }

    /// Run one query through both retry ladders.
    ///
    /// A 200 response whose `errors` array contains a rate-limit error is
    /// retried after waiting out the advertised reset window; second and
    /// later retries add an escalating backoff on top. Payload errors that
    /// are not rate limits are logged and the partial response is returned
    /// as-is, matching the API's partial-data semantics.
    pub async fn execute(
        &self,
        query: Query,
        params: &[(&str, &str)],
        pagination: &str,
    ) -> Result<Value, GitHubError> {
        let mut last_wait = std::time::Duration::ZERO;

        for attempt in 1..=PAYLOAD_MAX_ATTEMPTS {
            let response = self.fetch(query, params, pagination).await?;

            let rate_limit = response
                .get("errors")
                .and_then(Value::as_array)
                .filter(|errors| !errors.is_empty())
                .map(|errors| {
                    for error in errors.iter().filter(|e| !is_rate_limit_error(e)) {
                        let message = error
                            .get("message")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown error");
                        warn!(%message, "graphql error in payload, keeping partial response");
                    }
                    errors.iter().find(|e| is_rate_limit_error(e)).cloned()
                });

            match rate_limit {
                None | Some(None) => return Ok(response),
                Some(Some(error)) => {
                    let wait = wait_from_graphql_error(&error, Utc::now());
                    last_wait = wait;
                    // Only wait if there is a retry left to spend.
                    if attempt < PAYLOAD_MAX_ATTEMPTS {
                        warn!(attempt, ?wait, "rate limited in payload, waiting for reset");
                        tokio::time::sleep(wait).await;
                        if attempt > 1 {
                            let backoff = payload_backoff(wait, attempt - 1);
                            debug!(attempt, ?backoff, "escalating payload backoff");
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
        }

        Err(GitHubError::RateLimited { wait: last_wait })
    }

    /// Look up the authenticated user. The returned node id is what the
    /// commit-history query filters on as author.
    pub async fn viewer(&self) -> Result<Viewer, GitHubError> {
        let response = self.execute(Query::Viewer, &[], "").await?;
        let viewer = response
            .get("data")
            .and_then(|d| d.get("viewer"))
            .cloned()
            .ok_or_else(|| GitHubError::decode("missing data.viewer in response"))?;
        serde_json::from_value(viewer).map_err(|e| GitHubError::decode(e.to_string()))
    }

    /// Fetch all repositories owned by `username`.
    pub async fn list_repositories(
        &self,
        username: &str,
    ) -> Result<Vec<Repository>, GitHubError> {
        let nodes = self
            .paginate(Query::RepositoryList, &[("username", username)])
            .await?;
        let mut repos = Vec::with_capacity(nodes.len());
        for node in nodes {
            let repo: RepoNode =
                serde_json::from_value(node).map_err(|e| GitHubError::decode(e.to_string()))?;
            repos.push(Repository::from(repo));
        }
        debug!(count = repos.len(), username, "listed repositories");
        Ok(repos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::{json_response, status_response, MockTransport};
    use serde_json::json;
    use std::time::Duration;

    fn client_with(transport: &MockTransport) -> GraphQlClient {
        GraphQlClient::new("test-token", Arc::new(transport.clone()))
            .with_endpoint("https://github.test/graphql")
    }

    #[tokio::test]
    async fn fetch_returns_parsed_body_on_200() {
        let transport = MockTransport::new();
        transport.push_response(&["viewer"], json_response(json!({"data": {"ok": true}})));

        let client = client_with(&transport);
        let value = client.fetch(Query::Viewer, &[], "").await.expect("fetch");
        assert_eq!(value["data"]["ok"], json!(true));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let body = requests[0].body_text();
        assert!(body.contains("viewer"));
        assert!(requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == "authorization" && v == "bearer test-token"));
    }

    #[tokio::test]
    async fn fetch_maps_401_to_auth_error() {
        let transport = MockTransport::new();
        transport.push_response(&[], status_response(401, &[]));

        let client = client_with(&transport);
        let err = client
            .fetch(Query::Viewer, &[], "")
            .await
            .expect_err("401 should fail");
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn fetch_treats_404_as_fatal_without_retry() {
        let transport = MockTransport::new();
        transport.push_response(&[], status_response(404, &[]));

        let client = client_with(&transport);
        let err = client
            .fetch(Query::Viewer, &[], "")
            .await
            .expect_err("404 should fail");
        assert!(matches!(err, GitHubError::Fatal { status: 404, .. }));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_backs_off_exponentially_on_502() {
        let transport = MockTransport::new();
        transport.push_response(&[], status_response(502, &[]));
        transport.push_response(&[], status_response(502, &[]));
        transport.push_response(&[], json_response(json!({"data": {}})));

        let client = client_with(&transport);
        let start = tokio::time::Instant::now();
        client.fetch(Query::Viewer, &[], "").await.expect("fetch");

        // 1s after the first 502, 2s after the second.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(4), "elapsed {elapsed:?}");
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_waits_for_reset_header_on_403() {
        let transport = MockTransport::new();
        let reset = (Utc::now().timestamp() + 5).to_string();
        transport.push_response(&[], status_response(403, &[("x-ratelimit-reset", &reset)]));
        transport.push_response(&[], json_response(json!({"data": {}})));

        let client = client_with(&transport);
        let start = tokio::time::Instant::now();
        client.fetch(Query::Viewer, &[], "").await.expect("fetch");

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(4), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(8), "elapsed {elapsed:?}");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_gives_up_after_transport_budget() {
        let transport = MockTransport::new();
        for _ in 0..TRANSPORT_MAX_ATTEMPTS {
            transport.push_response(&[], status_response(502, &[]));
        }

        let client = client_with(&transport);
        let start = tokio::time::Instant::now();
        let err = client
            .fetch(Query::Viewer, &[], "")
            .await
            .expect_err("budget should run out");
        assert!(matches!(
            err,
            GitHubError::RetryBudgetExhausted { attempts, .. }
                if attempts == TRANSPORT_MAX_ATTEMPTS
        ));
        assert_eq!(transport.requests().len(), TRANSPORT_MAX_ATTEMPTS as usize);

        // Nine backoffs between the ten attempts (1+2+...+256 = 511s), and no
        // sleep after the last attempt has already failed.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(511), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(512), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn execute_waits_out_payload_rate_limit_then_retries() {
        let transport = MockTransport::new();
        let reset_at = (Utc::now() + chrono::Duration::seconds(30)).to_rfc3339();
        transport.push_response(
            &[],
            json_response(json!({
                "data": null,
                "errors": [{
                    "type": "RATE_LIMIT",
                    "message": "API rate limit exceeded",
                    "extensions": {"rateLimit": {"resetAt": reset_at}}
                }]
            })),
        );
        transport.push_response(&[], json_response(json!({"data": {"ok": true}})));

        let client = client_with(&transport);
        let start = tokio::time::Instant::now();
        let value = client.execute(Query::Viewer, &[], "").await.expect("execute");
        assert_eq!(value["data"]["ok"], json!(true));

        // The first retry waits out the reset window and nothing more.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(29), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(35), "elapsed {elapsed:?}");
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_gives_up_after_payload_budget() {
        let transport = MockTransport::new();
        for _ in 0..PAYLOAD_MAX_ATTEMPTS {
            transport.push_response(
                &[],
                json_response(json!({
                    "data": null,
                    "errors": [{"message": "rate limited, try again in 1 seconds"}]
                })),
            );
        }

        let client = client_with(&transport);
        let start = tokio::time::Instant::now();
        let err = client
            .execute(Query::Viewer, &[], "")
            .await
            .expect_err("budget should run out");
        assert!(matches!(
            err,
            GitHubError::RateLimited { wait } if wait == Duration::from_secs(1)
        ));
        assert_eq!(transport.requests().len(), PAYLOAD_MAX_ATTEMPTS as usize);

        // Nineteen retries each wait the advertised second, plus the
        // escalating backoff from the second retry on (1+2+...+18 = 171s);
        // the final attempt reports exhaustion without sleeping.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(190), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_secs(191), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn execute_returns_partial_response_for_non_rate_limit_errors() {
        let transport = MockTransport::new();
        transport.push_response(
            &[],
            json_response(json!({
                "data": {"repository": null},
                "errors": [{"type": "NOT_FOUND", "message": "Could not resolve repository"}]
            })),
        );

        let client = client_with(&transport);
        let value = client.execute(Query::Viewer, &[], "").await.expect("execute");
        assert!(value.get("errors").is_some());
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn viewer_decodes_identity() {
        let transport = MockTransport::new();
        transport.push_response(
            &["viewer"],
            json_response(json!({"data": {"viewer": {"id": "MDQ6VXNlcjE=", "login": "octocat"}}})),
        );

        let client = client_with(&transport);
        let viewer = client.viewer().await.expect("viewer");
        assert_eq!(viewer.login, "octocat");
        assert_eq!(viewer.id, "MDQ6VXNlcjE=");
    }

    #[tokio::test]
    async fn viewer_missing_data_is_a_decode_error() {
        let transport = MockTransport::new();
        transport.push_response(&[], json_response(json!({"data": {}})));

        let client = client_with(&transport);
        let err = client.viewer().await.expect_err("should fail to decode");
        assert!(matches!(err, GitHubError::Decode(_)));
    }
}
