//! Resilient JSON client for the addon hub.
//!
//! Every outbound request goes through a [`CircuitBreaker`] keyed by a
//! caller-supplied endpoint name and is bounded by a per-call timeout. The
//! actual bytes travel over a [`Transport`], so tests (and alternative HTTP
//! stacks) can swap the network out entirely.

mod breaker;
mod client;
pub mod error;
pub mod transport;
mod url;

pub use crate::breaker::{CircuitBreaker, CircuitState, Permit};
pub use crate::client::{ClientOptions, ResilientClient};
pub use crate::transport::{Method, Request, Response, Transport};
pub use crate::url::build_url;
use std::sync::Arc;

pub type TransportHandle = Arc<dyn Transport + Send + Sync>;
