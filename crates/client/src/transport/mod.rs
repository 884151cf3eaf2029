//! The byte-moving layer underneath [`ResilientClient`](crate::ResilientClient).
//!
//! A [`Transport`] knows nothing about breakers, timeouts or JSON decoding;
//! it sends one request and hands back whatever the remote answered. Non-2xx
//! statuses are *answers*, not errors: only failing to get an answer at all
//! is an error at this level.

mod http;
#[cfg(any(test, feature = "mock"))]
mod mock;

pub use self::http::ReqwestTransport;
#[cfg(any(test, feature = "mock"))]
pub use self::mock::{MockReply, MockTransport};
use crate::error::Result;
use async_trait::async_trait;
use derive_more::Display;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    /// Fully-formed absolute URL.
    pub url: String,
    /// JSON body (POST only).
    pub body: Option<serde_json::Value>,
}
impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}
impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests somewhere and returns the answers.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Name of the transport, used for logging only.
    fn name(&self) -> &str;

    /// Perform a single request.
    ///
    /// Returns [`Network`](crate::error::ErrorKind::Network) if no response
    /// was received. Implementations must not retry.
    async fn send(&self, request: Request) -> Result<Response>;
}
