use super::{Method, Request, Response, Transport};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;

/// Production transport over [`reqwest`].
///
/// Timeouts are deliberately *not* configured on the underlying client: the
/// [`ResilientClient`](crate::ResilientClient) owns the deadline so that a
/// timed out request is also reported to the circuit breaker.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    name: String,
    client: reqwest::Client,
}
impl ReqwestTransport {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .or_raise(|| ErrorKind::InvalidRequest("could not construct HTTP client".to_string()))?;
        Ok(Self {
            name: "reqwest".to_string(),
            client,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, request: Request) -> Result<Response> {
        let builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => {
                let builder = self.client.post(&request.url);
                match &request.body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            },
        };
        let response = builder.send().await.map_err(|err| exn::Exn::from(ErrorKind::Network(err.to_string())))?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(|err| exn::Exn::from(ErrorKind::Network(err.to_string())))?;
        tracing::trace!(transport = %self.name, status, bytes = body.len(), url = %request.url, "Received response");
        Ok(Response { status, body: body.to_vec() })
    }
}
