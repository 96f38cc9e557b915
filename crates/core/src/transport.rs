//! HTTP transport boundary.
//!
//! The token broker and lookup pipeline describe requests as plain
//! [`HttpRequest`] values and hand them to an [`HttpTransport`]. Production
//! code uses [`ReqwestTransport`]; tests substitute an in-memory transport.

use crate::TransportError;
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully described outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// URL-encoded form body, sent with
    /// `Content-Type: application/x-www-form-urlencoded`.
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            form: Some(form),
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_owned(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_owned(), value.into()));
        self
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! In-memory transport that answers by URL suffix and records every request.

    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;

    type Reply = Result<HttpResponse, TransportError>;

    #[derive(Default)]
    pub struct MockTransport {
        routes: Mutex<HashMap<String, VecDeque<Reply>>>,
        sticky: Mutex<HashMap<String, Reply>>,
        requests: Mutex<Vec<HttpRequest>>,
        delay: Option<Duration>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every response, leaving room for concurrent callers to pile up.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Queue a one-shot reply for URLs ending in `suffix`.
        pub fn push(&self, suffix: &str, status: u16, body: impl Into<String>) {
            self.push_reply(
                suffix,
                Ok(HttpResponse {
                    status,
                    body: body.into(),
                }),
            );
        }

        pub fn push_reply(&self, suffix: &str, reply: Reply) {
            self.routes
                .lock()
                .unwrap()
                .entry(suffix.to_owned())
                .or_default()
                .push_back(reply);
        }

        /// Reply used whenever the queue for `suffix` is empty.
        pub fn always(&self, suffix: &str, status: u16, body: impl Into<String>) {
            self.sticky.lock().unwrap().insert(
                suffix.to_owned(),
                Ok(HttpResponse {
                    status,
                    body: body.into(),
                }),
            );
        }

        pub fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }

        pub fn calls_to(&self, suffix: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url.ends_with(suffix))
                .count()
        }
    }

    #[async_trait]
    impl HttpTransport for MockTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            let mut routes = self.routes.lock().unwrap();
            let queued = routes
                .iter_mut()
                .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
                .and_then(|(_, queue)| queue.pop_front());
            drop(routes);
            if let Some(reply) = queued {
                return reply;
            }

            let sticky = self.sticky.lock().unwrap();
            let reply = sticky
                .iter()
                .find(|(suffix, _)| request.url.ends_with(suffix.as_str()))
                .map(|(_, reply)| reply.clone());
            reply.unwrap_or_else(|| {
                Err(TransportError::Connect(format!(
                    "no route for {}",
                    request.url
                )))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_parts() {
        let req = HttpRequest::get("https://id.who.int/icd/release/11/2024-01/mms/autocode")
            .query("searchText", "sore throat")
            .header("Accept", "application/json");
        assert_eq!(req.method, Method::Get);
        assert_eq!(req.query_value("searchText"), Some("sore throat"));
        assert_eq!(req.header_value("accept"), Some("application/json"));
        assert!(req.form.is_none());
    }

    #[test]
    fn success_covers_2xx_only() {
        let ok = HttpResponse {
            status: 204,
            body: String::new(),
        };
        let redirect = HttpResponse {
            status: 302,
            body: String::new(),
        };
        assert!(ok.is_success());
        assert!(!redirect.is_success());
    }
}
