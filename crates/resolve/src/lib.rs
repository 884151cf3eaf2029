//! Resolution of installed addons against the addon hub.
//!
//! The entry point is an [`AddonProvider`]; [`HubProvider`] is the one that
//! talks to the hub. A scan pass takes fingerprinted folders (from a
//! [`FolderScanner`]), looks all of them up in one batched request, picks the
//! best release per folder for the client's game variant and folds the
//! folders that matched the same release into one [`ResolvedAddon`].
//!
//! Failures are contained at the smallest useful scope: an unmatched folder
//! is simply absent from the result, an unresolvable addon is logged and
//! skipped, and informational lookups (changelog, description) degrade to an
//! empty string. Only transport failures abort the call that caused them.
//!
//! [`ResolvedAddon`]: hubsync_models::ResolvedAddon

pub mod error;
#[cfg(test)]
mod fixtures;
mod hub;
mod provider;
mod reconcile;
mod scanner;
mod search;

pub use crate::hub::{CacheTtls, HubProvider, NAME as HUB_PROVIDER_NAME};
pub use crate::provider::{AddonProvider, BatchResult, ProviderHandle, ProviderRegistry};
pub use crate::scanner::FolderScanner;
