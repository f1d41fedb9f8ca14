//! Scripted in-memory transport.
//!
//! [`MockTransport`] answers requests from responses registered per method and
//! path, and records every request it receives. Responses can arrive in
//! chunks, with per-chunk delays, after a latency, end in a stream error or
//! stall forever, which is enough to exercise streaming, cancellation and
//! timeouts without a server.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use settee_core::{Error, Result};
use settee_wire::{BodyStream, Method, WireRequest, WireResponse};

use crate::transport::Transport;

#[derive(Debug, Clone)]
enum Ending {
    Complete,
    Fail(Error),
    Stall,
}

/// One scripted response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    chunks: Vec<Bytes>,
    latency: Option<Duration>,
    chunk_delay: Option<Duration>,
    ending: Ending,
    never: bool,
}

impl MockResponse {
    /// A response with a JSON body.
    pub fn json(status: u16, body: JsonValue) -> Self {
        Self::body(status, body.to_string())
    }

    /// A response with a raw body.
    pub fn body(status: u16, body: impl Into<String>) -> Self {
        Self::chunked(status, [body.into()])
    }

    /// A response whose body arrives in the given chunks.
    pub fn chunked<S: Into<String>>(status: u16, chunks: impl IntoIterator<Item = S>) -> Self {
        Self {
            status,
            chunks: chunks
                .into_iter()
                .map(|c| Bytes::from(c.into()))
                .collect(),
            latency: None,
            chunk_delay: None,
            ending: Ending::Complete,
            never: false,
        }
    }

    /// A request that never gets a response.
    pub fn never() -> Self {
        let mut response = Self::chunked(200, Vec::<String>::new());
        response.never = true;
        response
    }

    /// Delay before the status line arrives.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Delay before each body chunk.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// End the body with a stream error after the chunks.
    pub fn fail_with(mut self, error: Error) -> Self {
        self.ending = Ending::Fail(error);
        self
    }

    /// Stop sending after the chunks without ever ending the body.
    pub fn stall(mut self) -> Self {
        self.ending = Ending::Stall;
        self
    }

    fn into_wire(self) -> WireResponse {
        let delay = self.chunk_delay;
        let mut items: Vec<Result<Bytes>> = self.chunks.into_iter().map(Ok).collect();
        let stall = match self.ending {
            Ending::Complete => false,
            Ending::Fail(err) => {
                items.push(Err(err));
                false
            }
            Ending::Stall => true,
        };
        let chunks = stream::iter(items).then(move |item| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            item
        });
        let body: BodyStream = if stall {
            Box::pin(chunks.chain(stream::pending()))
        } else {
            Box::pin(chunks)
        };
        WireResponse::new(
            self.status,
            vec![("Content-Type".to_string(), "application/json".to_string())],
            body,
        )
    }
}

type RouteKey = (Method, String);

/// In-memory [`Transport`] replaying scripted responses.
///
/// Responses for a route are served in registration order; the last one is
/// repeated for any further requests.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<RouteKey, VecDeque<MockResponse>>>,
    requests: Mutex<Vec<WireRequest>>,
    active: AtomicUsize,
    peak_active: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a response for `method` on the percent-encoded `path`.
    pub fn respond(&self, method: Method, path: &str, response: MockResponse) {
        self.routes
            .lock()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(response);
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Most requests ever waiting on a response at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_active.load(Ordering::Acquire)
    }

    fn next_response(&self, key: &RouteKey) -> Option<MockResponse> {
        let mut routes = self.routes.lock();
        let queue = routes.get_mut(key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

/// Tracks requests waiting on a response, including ones dropped mid-wait.
struct ActiveGuard<'a> {
    transport: &'a MockTransport,
}

impl<'a> ActiveGuard<'a> {
    fn enter(transport: &'a MockTransport) -> Self {
        let now = transport.active.fetch_add(1, Ordering::AcqRel) + 1;
        transport.peak_active.fetch_max(now, Ordering::AcqRel);
        Self { transport }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.transport.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let key = (request.method, request.path().to_string());
        self.requests.lock().push(request);
        let _active = ActiveGuard::enter(self);

        let response = self.next_response(&key).ok_or_else(|| {
            Error::transport(format!("no mock response for {} {}", key.0, key.1))
        })?;
        if response.never {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = response.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(response.into_wire())
    }
}
