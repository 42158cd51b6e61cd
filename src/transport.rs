//! Network access for the controllers.
//!
//! [`Transport`] is the raw request/response seam; [`HttpTransport`] drives it
//! with `ureq` on tokio's blocking pool. [`Client`] sits on top and knows the
//! three response shapes the server speaks: HTML fragments, `{"count": n}` and
//! `{"message": "..."}`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::context::PageContext;
use crate::error::RequestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues a request and resolves with whatever the server answered.
///
/// Non-success statuses are still `Ok`; only requests that never completed are
/// reported as [`RequestError::Transport`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, RequestError>>;
}

pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(Duration::from_secs(30)).build();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            agent,
        }
    }

    /// Endpoints in markup are usually site-relative (`/ajax/...`).
    fn resolve(&self, url: &str) -> String {
        if url.starts_with('/') {
            format!("{}{}", self.base_url, url)
        } else {
            url.to_string()
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: Request) -> BoxFuture<'static, Result<Response, RequestError>> {
        let agent = self.agent.clone();
        let url = self.resolve(&request.url);
        let method = request.method;
        let headers = request.headers;

        // ureq blocks, keep it off the interaction thread
        async move {
            tokio::task::spawn_blocking(move || {
                let mut call = agent.request(method.as_str(), &url);
                for (name, value) in &headers {
                    call = call.set(name, value);
                }

                let response = match call.call() {
                    Ok(response) => response,
                    Err(ureq::Error::Status(_, response)) => response,
                    Err(e) => return Err(RequestError::Transport(e.to_string())),
                };

                let status = response.status();
                let body = response.into_string().map_err(|e| RequestError::Transport(e.to_string()))?;
                Ok(Response { status, body })
            })
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?
        }
        .boxed()
    }
}

#[derive(Deserialize)]
struct CountBody {
    count: u64,
}

#[derive(Deserialize)]
struct MessageBody {
    message: String,
}

/// Typed access to the server's ajax endpoints.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    context: Arc<PageContext>,
    csrf_header: String,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, context: Arc<PageContext>, csrf_header: impl Into<String>) -> Self {
        Self {
            transport,
            context,
            csrf_header: csrf_header.into(),
        }
    }

    async fn send(&self, method: Method, url: &str) -> Result<String, RequestError> {
        let mut headers = Vec::new();
        if method == Method::Post {
            headers.push((self.csrf_header.clone(), self.context.csrf_token.clone()));
        }

        let response = self
            .transport
            .send(Request {
                method,
                url: url.to_string(),
                headers,
            })
            .await?;
        debug!(%method, url, status = response.status, "request completed");

        if response.is_success() {
            Ok(response.body)
        } else {
            Err(RequestError::from_status(response.status, &response.body))
        }
    }

    /// `GET` a renderable HTML fragment.
    #[instrument(skip(self))]
    pub async fn fetch_html(&self, url: &str) -> Result<String, RequestError> {
        self.send(Method::Get, url).await
    }

    /// `GET` a `{"count": n}` document.
    #[instrument(skip(self))]
    pub async fn fetch_count(&self, url: &str) -> Result<u64, RequestError> {
        let body = self.send(Method::Get, url).await?;
        serde_json::from_str::<CountBody>(&body)
            .map(|b| b.count)
            .map_err(|e| RequestError::Decode(e.to_string()))
    }

    /// `POST` a mutating action; returns the server's confirmation text.
    #[instrument(skip(self))]
    pub async fn post_action(&self, url: &str) -> Result<String, RequestError> {
        let body = self.send(Method::Post, url).await?;
        serde_json::from_str::<MessageBody>(&body)
            .map(|b| b.message)
            .map_err(|e| RequestError::Decode(e.to_string()))
    }
}
