use crate::TransportHandle;
use crate::breaker::{CircuitBreaker, CircuitState};
use crate::error::{ErrorKind, Result};
use crate::transport::Request;
use exn::ResultExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::instrument;

/// Tunables of a [`ResilientClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Deadline for a single request, including reading the body.
    pub request_timeout: Duration,
    /// Consecutive failures before an endpoint's breaker opens.
    pub failure_threshold: u32,
    /// Time an open breaker waits before letting a probe through.
    pub reset_timeout: Duration,
}
impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// JSON client that guards every endpoint with its own circuit breaker.
///
/// Endpoints are identified by a caller-chosen name; all requests made under
/// the same name share a breaker (and therefore a failure count), whatever
/// their URL.
///
/// What counts as a failure for the breaker: no answer (network error or
/// timeout) and server errors (`5xx`). Anything else is an answer, even when
/// the call itself returns an error (`404`, undecodable body).
pub struct ResilientClient {
    transport: TransportHandle,
    options: ClientOptions,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl ResilientClient {
    pub fn new(transport: TransportHandle, options: ClientOptions) -> Self {
        Self {
            transport,
            options,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// The breaker guarding `endpoint`, created on first use.
    pub fn breaker(&self, endpoint: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(PoisonError::into_inner);
        let breaker = breakers.entry(endpoint.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(endpoint, self.options.failure_threshold, self.options.reset_timeout))
        });
        Arc::clone(breaker)
    }

    /// Current breaker state for `endpoint` (closed if never used).
    pub fn circuit_state(&self, endpoint: &str) -> CircuitState {
        self.breaker(endpoint).state()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, url: &str) -> Result<T> {
        let body = self.execute(endpoint, Request::get(url)).await?;
        decode(&body)
    }

    pub async fn post_json<T, B>(&self, endpoint: &str, url: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body =
            serde_json::to_value(body).or_raise(|| ErrorKind::InvalidRequest("unserializable body".to_string()))?;
        let body = self.execute(endpoint, Request::post(url, body)).await?;
        decode(&body)
    }

    #[instrument(level = "debug", skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, endpoint: &str, request: Request) -> Result<Vec<u8>> {
        let permit = self.breaker(endpoint).try_acquire()?;
        let timeout = self.options.request_timeout;
        match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Err(_elapsed) => {
                permit.failure();
                tracing::warn!(endpoint, ?timeout, "Request timed out");
                exn::bail!(ErrorKind::Timeout(timeout));
            },
            Ok(Err(err)) => {
                permit.failure();
                let kind: &ErrorKind = &err;
                tracing::warn!(endpoint, error = %kind, "Request failed");
                Err(err)
            },
            Ok(Ok(response)) if response.status >= 500 => {
                permit.failure();
                tracing::warn!(endpoint, status = response.status, "Server error");
                exn::bail!(ErrorKind::Status(response.status));
            },
            Ok(Ok(response)) if !response.is_success() => {
                permit.success();
                tracing::debug!(endpoint, status = response.status, "Unsuccessful response");
                exn::bail!(ErrorKind::Status(response.status));
            },
            Ok(Ok(response)) => {
                permit.success();
                Ok(response.body)
            },
        }
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).or_raise(|| ErrorKind::MalformedResponse)
}
