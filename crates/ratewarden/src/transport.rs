//! Transport adapters behind one capability interface.
//!
//! The limiter never talks to an HTTP client directly: it hands a
//! [`RequestIntent`] to an injected [`Transport`] and gets back the minimal
//! [`TransportResponse`] shape. Adapters for the async and blocking
//! `reqwest` clients ship here, plus a scriptable [`MockTransport`] for
//! tests; anything satisfying the trait plugs in the same way.

use async_trait::async_trait;
use ratewarden_core::TransportResponse;
use ratewarden_error::{ConfigError, RatewardenResult, TransportError};
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// One outbound call: what to send plus per-call controls.
///
/// # Examples
///
/// ```
/// use ratewarden::RequestIntent;
///
/// let intent = RequestIntent::get("https://api.example.com/users?page=2").unwrap();
/// assert_eq!(intent.method, reqwest::Method::GET);
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
pub struct RequestIntent {
    /// HTTP method.
    pub method: Method,
    /// Target URL.
    pub url: Url,
    /// Extra request headers.
    #[builder(default)]
    pub headers: HeaderMap,
    /// Query parameters appended to the URL.
    #[builder(default)]
    pub query: Vec<(String, String)>,
    /// Request body.
    #[builder(default)]
    pub body: Option<Vec<u8>>,
    /// Per-call bound on total admission wait, tighter than the limiter's
    /// own maximum.
    #[builder(default)]
    pub deadline: Option<Duration>,
    /// Cooperative cancellation: aborts WAIT and in-flight DISPATCH, and
    /// suppresses any state update for the call.
    #[builder(default)]
    pub cancel: Option<CancellationToken>,
}

impl RequestIntent {
    /// An intent with no headers, query, body, or per-call controls.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            deadline: None,
            cancel: None,
        }
    }

    /// A plain GET of `url`.
    pub fn get(url: &str) -> RatewardenResult<Self> {
        let url = Url::parse(url).map_err(|e| ConfigError::new(format!("invalid url {url:?}: {e}")))?;
        Ok(Self::new(Method::GET, url))
    }

    /// Creates a new request intent builder.
    pub fn builder() -> RequestIntentBuilder {
        RequestIntentBuilder::default()
    }
}

/// Trait for pluggable HTTP transports.
///
/// Implementations issue the request and produce the response capability
/// shape; they do not retry, pace, or interpret rate limit headers - that
/// is the limiter's job. Network failures surface as
/// [`TransportError`] and propagate to the caller unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue the request described by `intent`.
    async fn execute(&self, intent: &RequestIntent) -> RatewardenResult<TransportResponse>;
}

/// Adapter over the asynchronous `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Wrap an existing client, keeping its pool and TLS configuration.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, intent: &RequestIntent) -> RatewardenResult<TransportResponse> {
        let mut request = self
            .client
            .request(intent.method.clone(), intent.url.clone())
            .headers(intent.headers.clone());
        if !intent.query.is_empty() {
            request = request.query(&intent.query);
        }
        if let Some(body) = &intent.body {
            request = request.body(body.clone());
        }
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;
        Ok(TransportResponse::new(status, headers, body.to_vec(), url))
    }
}

/// Adapter over the blocking `reqwest` client.
///
/// The blocking call runs on the runtime's blocking pool so it satisfies
/// the async [`Transport`] contract. Construct the inner client outside any
/// async context.
#[derive(Debug, Clone)]
pub struct ReqwestBlockingTransport {
    client: Arc<reqwest::blocking::Client>,
}

impl ReqwestBlockingTransport {
    /// Wrap an existing blocking client.
    pub fn new(client: reqwest::blocking::Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl Transport for ReqwestBlockingTransport {
    async fn execute(&self, intent: &RequestIntent) -> RatewardenResult<TransportResponse> {
        let client = Arc::clone(&self.client);
        let intent = intent.clone();
        let joined = tokio::task::spawn_blocking(move || -> RatewardenResult<TransportResponse> {
            let mut request = client
                .request(intent.method.clone(), intent.url.clone())
                .headers(intent.headers.clone());
            if !intent.query.is_empty() {
                request = request.query(&intent.query);
            }
            if let Some(body) = &intent.body {
                request = request.body(body.clone());
            }
            let response = request
                .send()
                .map_err(|e| TransportError::new(e.to_string()))?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let url = response.url().clone();
            let body = response
                .bytes()
                .map_err(|e| TransportError::new(e.to_string()))?;
            Ok(TransportResponse::new(status, headers, body.to_vec(), url))
        })
        .await;
        joined.map_err(|e| TransportError::new(format!("blocking transport panicked: {e}")))?
    }
}

#[derive(Debug, Clone)]
enum Scripted {
    Respond {
        status: u16,
        headers: HeaderMap,
        body: Vec<u8>,
    },
    Fail(String),
}

/// Scriptable transport for tests: responds with a queued script, in order.
///
/// # Examples
///
/// ```
/// use ratewarden::MockTransport;
///
/// let transport = MockTransport::new();
/// transport.enqueue(429, &[("retry-after", "2")], b"slow down");
/// transport.enqueue(200, &[], b"ok");
/// ```
#[derive(Debug, Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
}

impl MockTransport {
    /// An empty script; executing against it errors until responses are
    /// enqueued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status, headers, and body.
    pub fn enqueue(&self, status: u16, headers: &[(&str, &str)], body: &[u8]) {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            map.insert(
                reqwest::header::HeaderName::from_bytes(name.as_bytes())
                    .expect("valid test header name"),
                value.parse().expect("valid test header value"),
            );
        }
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Respond {
                status,
                headers: map,
                body: body.to_vec(),
            });
    }

    /// Queue a transport failure.
    pub fn enqueue_error(&self, message: &str) {
        self.script
            .lock()
            .expect("mock script lock poisoned")
            .push_back(Scripted::Fail(message.to_string()));
    }

    /// How many times the transport has been invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, intent: &RequestIntent) -> RatewardenResult<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .expect("mock script lock poisoned")
            .pop_front();
        match next {
            Some(Scripted::Respond {
                status,
                headers,
                body,
            }) => Ok(TransportResponse::new(
                status,
                headers,
                body,
                intent.url.clone(),
            )),
            Some(Scripted::Fail(message)) => Err(TransportError::new(message).into()),
            None => Err(TransportError::new("mock transport script exhausted").into()),
        }
    }
}
