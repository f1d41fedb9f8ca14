//! Transports: the one place requests leave the process.
//!
//! A [`Transport`] sends a [`WireRequest`] and returns the response status,
//! headers and a chunked body stream. Dropping the returned future or the
//! body stream aborts the exchange, which is how cancellation and timeouts
//! reach the network.

use async_trait::async_trait;
use futures_util::StreamExt;
use settee_core::{Error, Result};
use settee_wire::{Method, WireRequest, WireResponse};
use tracing::debug;

use crate::config::ClientConfig;

/// Sends wire requests.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse>;
}

/// HTTP/1.1 and HTTP/2 transport backed by a pooled `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };
        debug!(
            target: "settee::transport",
            method = %request.method,
            path = request.path(),
            "sending request"
        );

        let mut builder = self.client.request(method, request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        debug!(target: "settee::transport", status, "response headers received");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(transport_error));
        Ok(WireResponse::new(status, headers, Box::pin(body)))
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    Error::transport(reason)
}
