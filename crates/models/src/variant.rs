use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;

/// The kind of locally installed game client an addon folder belongs to.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientType {
    #[display("classic-era")]
    ClassicEra,
    #[display("classic")]
    Classic,
    #[display("classic-ptr")]
    ClassicPtr,
    #[display("classic-beta")]
    ClassicBeta,
    #[display("retail")]
    Retail,
    #[display("retail-ptr")]
    RetailPtr,
    #[display("beta")]
    Beta,
    /// Anything the client detection didn't recognise.
    #[default]
    #[display("unknown")]
    Unknown,
}

impl ClientType {
    /// Map a client kind onto the catalog variant its addons are published for.
    ///
    /// Total: every client kind (including [`Unknown`](Self::Unknown)) maps to
    /// a variant, with [`GameVariant::Retail`] as the fallback.
    pub fn game_variant(self) -> GameVariant {
        match self {
            Self::ClassicEra => GameVariant::Classic,
            Self::Classic | Self::ClassicPtr | Self::ClassicBeta => GameVariant::BurningCrusade,
            Self::Retail | Self::RetailPtr | Self::Beta | Self::Unknown => GameVariant::Retail,
        }
    }
}

impl FromStr for ClientType {
    type Err = Infallible;

    /// Lenient parse: case, dashes, underscores and spaces are ignored, so
    /// `"ClassicEra"`, `"classic_era"` and `"classic-era"` are all equal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String =
            s.chars().filter(|c| !matches!(c, '-' | '_' | ' ')).map(|c| c.to_ascii_lowercase()).collect();
        Ok(match normalized.as_str() {
            "classicera" => Self::ClassicEra,
            "classic" => Self::Classic,
            "classicptr" => Self::ClassicPtr,
            "classicbeta" => Self::ClassicBeta,
            "retail" => Self::Retail,
            "retailptr" => Self::RetailPtr,
            "beta" => Self::Beta,
            _ => Self::Unknown,
        })
    }
}

/// Compatibility tier a catalog release is published for.
///
/// The [`Display`] form doubles as the path segment used by the hub API.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameVariant {
    #[display("retail")]
    Retail,
    #[display("classic")]
    Classic,
    #[display("burningCrusade")]
    BurningCrusade,
    /// A tier this build doesn't know about. Never requested, never preferred.
    #[serde(other)]
    #[display("unknown")]
    Unknown,
}
