//! HTTP transport boundary.
//!
//! All network I/O goes through the [`HttpTransport`] trait so that the
//! GraphQL client can be exercised in tests without sockets. The production
//! implementation lives in [`reqwest_transport`]; tests use [`mock::MockTransport`].

use async_trait::async_trait;
use thiserror::Error;

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// An outgoing POST request. The GitHub GraphQL API is POST-only, so the
/// transport does not model other methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// The request body decoded as UTF-8, for logging and test assertions.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A received response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("no mock response registered for request to {url}")]
    NoMockResponse { url: String },
}

/// Transport boundary for all HTTP I/O.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub mod reqwest_transport {
    use super::*;

    use std::time::Duration as StdDuration;

    /// A real HTTP transport backed by reqwest.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        pub fn with_timeout(timeout: StdDuration) -> Result<Self, HttpError> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| HttpError::Transport(e.to_string()))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn post(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let mut builder = self.client.post(&request.url);
            for (k, v) in request.headers {
                builder = builder.header(&k, &v);
            }

            if !request.body.is_empty() {
                builder = builder.body(request.body);
            }

            let resp = builder
                .send()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?;

            let status = resp.status().as_u16();
            let mut headers: HttpHeaders = Vec::new();
            for (name, value) in resp.headers().iter() {
                headers.push((
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                ));
            }

            let body = resp
                .bytes()
                .await
                .map_err(|e| HttpError::Transport(e.to_string()))?
                .to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

pub mod mock {
    //! In-memory mock transport for tests.
    //!
    //! No sockets, no loopback HTTP servers. All GraphQL requests hit a single
    //! endpoint URL, so responses are routed by substrings of the request body
    //! (the rendered query) rather than by URL.

    use super::*;

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockTransport {
        inner: Arc<Mutex<MockTransportInner>>,
    }

    #[derive(Default)]
    struct MockTransportInner {
        routes: Vec<(Vec<String>, VecDeque<HttpResponse>)>,
        requests: Vec<HttpRequest>,
    }

    impl MockTransport {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Register a response for requests whose body contains every one of
        /// `needles`. An empty needle list matches any request.
        ///
        /// Responses registered for the same needle set are returned in FIFO
        /// order. Routes are tried in registration order; a route with an
        /// exhausted queue is skipped.
        pub fn push_response(&self, needles: &[&str], response: HttpResponse) {
            let needles: Vec<String> = needles.iter().map(|n| (*n).to_string()).collect();
            let mut inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");
            if let Some((_, queue)) = inner.routes.iter_mut().find(|(n, _)| *n == needles) {
                queue.push_back(response);
            } else {
                inner
                    .routes
                    .push((needles, VecDeque::from(vec![response])));
            }
        }

        /// All requests received so far, in order.
        #[must_use]
        pub fn requests(&self) -> Vec<HttpRequest> {
            let inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");
            inner.requests.clone()
        }

        /// Number of requests whose body contains `needle`.
        #[must_use]
        pub fn request_count_matching(&self, needle: &str) -> usize {
            self.requests()
                .iter()
                .filter(|r| r.body_text().contains(needle))
                .count()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn post(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let mut inner = self
                .inner
                .lock()
                .expect("mock transport lock should not be poisoned");

            let body = String::from_utf8_lossy(&request.body).into_owned();
            let url = request.url.clone();
            inner.requests.push(request);

            let matched = inner
                .routes
                .iter_mut()
                .find(|(needles, queue)| {
                    !queue.is_empty() && needles.iter().all(|n| body.contains(n.as_str()))
                })
                .and_then(|(_, queue)| queue.pop_front());

            match matched {
                Some(resp) => Ok(resp),
                None => Err(HttpError::NoMockResponse { url }),
            }
        }
    }

    /// Build a 200 response with a JSON body.
    #[must_use]
    pub fn json_response(body: serde_json::Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string().into_bytes(),
        }
    }

    /// Build a response with an arbitrary status and headers, empty body.
    #[must_use]
    pub fn status_response(status: u16, headers: &[(&str, &str)]) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: Vec::new(),
        }
    }
}
