//! Data model shared by every hubsync crate.
//!
//! Three families of types live here:
//! - **Remote records** ([`RemoteAddon`], [`RemoteRelease`], [`FingerprintMatch`]),
//!   deserialized straight from the hub's JSON responses and never mutated.
//!   List responses hold them as [`Lenient`] entries, so one bad entry doesn't
//!   sink the whole list.
//! - **Local records** ([`ScanResult`], [`ResolvedScanResult`]), produced by
//!   the folder scanner and by the reconciliation pass.
//! - **Output entities** ([`ResolvedAddon`], [`AddonSearchResult`]), handed to
//!   the caller and never retained by the resolution layer.

mod addon;
mod lenient;
mod local;
mod remote;
mod variant;

pub use crate::addon::{AddonSearchResult, AddonSearchResultFile, Channel, ResolvedAddon};
pub use crate::lenient::Lenient;
pub use crate::local::{ResolvedScanResult, ScanResult};
pub use crate::remote::{
    AddonEnvelope, AddonFolder, AddonsEnvelope, BatchRequest, FingerprintMatch, FingerprintRequest,
    FingerprintResponse, FundingLink, GameVersion, ReleaseEnvelope, RemoteAddon, RemoteRelease,
};
pub use crate::variant::{ClientType, GameVariant};
