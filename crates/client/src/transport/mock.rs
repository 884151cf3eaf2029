//! In-memory transport for testing.

use super::{Method, Request, Response, Transport};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

/// What the [`MockTransport`] answers for a route.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Answer with a status code and raw body.
    Respond { status: u16, body: Vec<u8> },
    /// Fail as if the connection dropped.
    Fail(String),
}
impl MockReply {
    /// A `200 OK` with `value` serialized as JSON.
    ///
    /// Panics if `value` can't be serialized: broken test setup should not
    /// produce a passing test.
    pub fn json(value: impl Serialize) -> Self {
        let body = serde_json::to_vec(&value).expect("MockReply::json: unserializable value");
        Self::Respond { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self::Respond { status, body: Vec::new() }
    }
}

/// Transport that answers from a route table instead of the network.
///
/// Routes are keyed by method and exact URL; unknown routes answer `404`.
/// Every request is recorded (before any delay is applied) so tests can
/// assert how much traffic actually left the client.
///
/// # Examples
///
/// ```
/// use hubsync_client::transport::{Method, MockReply, MockTransport, Transport};
/// use hubsync_client::Request;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = MockTransport::default()
///     .with_reply(Method::Get, "http://mock/ping", MockReply::json("pong"));
/// let response = transport.send(Request::get("http://mock/ping")).await.unwrap();
/// assert_eq!(response.body, br#""pong""#);
/// assert_eq!(transport.request_count().await, 1);
/// # }
/// ```
pub struct MockTransport {
    name: String,
    delay: Option<Duration>,
    routes: RwLock<HashMap<(Method, String), MockReply>>,
    requests: RwLock<Vec<Request>>,
}

impl MockTransport {
    /// Wait this long before answering every request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_reply(mut self, method: Method, url: impl Into<String>, reply: MockReply) -> Self {
        self.routes.get_mut().insert((method, url.into()), reply);
        self
    }

    /// Replace (or add) a route after construction.
    pub async fn set_reply(&self, method: Method, url: impl Into<String>, reply: MockReply) {
        self.routes.write().await.insert((method, url.into()), reply);
    }

    pub async fn requests(&self) -> Vec<Request> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            name: "mock".to_string(),
            delay: None,
            routes: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let key = (request.method, request.url.clone());
        self.requests.write().await.push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self.routes.read().await.get(&key).cloned();
        match reply {
            Some(MockReply::Respond { status, body }) => Ok(Response { status, body }),
            Some(MockReply::Fail(reason)) => exn::bail!(ErrorKind::Network(reason)),
            None => Ok(Response { status: 404, body: Vec::new() }),
        }
    }
}
