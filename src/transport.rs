//! HttpFetcher
//!
//! Blocking-from-the-caller's-perspective HTTPS GET/POST with form or JSON
//! bodies (§2, §5). Grounded almost unchanged on the teacher's
//! `core/transport.rs` — its `HttpTransport` trait already matches this
//! component's responsibility.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{AgentError, AgentResult};

pub const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

/// HttpFetcher interface (§2: "interface only", out of scope is its
/// concrete TLS implementation, not its shape).
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn send(&self, request: HttpRequest) -> AgentResult<HttpResponse>;
}

/// Production fetcher. Redirects are never followed — an OIDC token or
/// authorization endpoint issuing a redirect is itself an error
/// condition, not something to chase. Honors `HTTP_PROXY`/`HTTPS_PROXY`
/// via reqwest's default environment-proxy detection (§6).
pub struct ReqwestHttpFetcher {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestHttpFetcher {
    pub fn new() -> AgentResult<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AgentError::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestHttpFetcher {
    async fn send(&self, request: HttpRequest) -> AgentResult<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        builder = builder.timeout(timeout);

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AgentError::UpstreamTimeout
            } else {
                AgentError::UpstreamError {
                    status: None,
                    body: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        let mut headers = HashMap::new();
        for (k, v) in response.headers() {
            if let Ok(v) = v.to_str() {
                headers.insert(k.to_string().to_lowercase(), v.to_string());
            }
        }

        if let Some(len) = response.content_length() {
            if len as usize > MAX_RESPONSE_BYTES {
                return Err(AgentError::UpstreamError {
                    status: Some(status),
                    body: "response exceeded maximum size".into(),
                });
            }
        }

        let body = response
            .text()
            .await
            .map_err(|e| AgentError::UpstreamError {
                status: Some(status),
                body: e.to_string(),
            })?;
        if body.len() > MAX_RESPONSE_BYTES {
            return Err(AgentError::UpstreamError {
                status: Some(status),
                body: "response exceeded maximum size".into(),
            });
        }

        Ok(HttpResponse { status, headers, body })
    }
}

/// Mock fetcher for testing state machines without a network, mirroring
/// the teacher's `MockHttpTransport` (queued responses + request history).
#[derive(Default)]
pub struct MockHttpFetcher {
    responses: std::sync::Mutex<std::collections::VecDeque<HttpResponse>>,
    request_history: std::sync::Mutex<Vec<HttpRequest>>,
}

impl MockHttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_response(&self, response: HttpResponse) -> &Self {
        self.responses.lock().unwrap().push_back(response);
        self
    }

    pub fn queue_json(&self, status: u16, body: &impl serde::Serialize) -> &Self {
        self.queue_response(HttpResponse {
            status,
            headers: [("content-type".to_string(), "application/json".to_string())]
                .into_iter()
                .collect(),
            body: serde_json::to_string(body).unwrap(),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.request_history.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.request_history.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpFetcher for MockHttpFetcher {
    async fn send(&self, request: HttpRequest) -> AgentResult<HttpResponse> {
        self.request_history.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::Internal("no mock response queued".into()))
    }
}
