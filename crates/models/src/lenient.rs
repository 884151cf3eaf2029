use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One entry of a list response, decoded on its own.
///
/// An entry that doesn't fit its record type is kept as raw JSON along with
/// the reason it was rejected, instead of failing the whole response.
#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Valid(T),
    Invalid { raw: Value, reason: String },
}
impl<T> Lenient<T> {
    pub fn as_valid(&self) -> Option<&T> {
        match self {
            Self::Valid(value) => Some(value),
            Self::Invalid { .. } => None,
        }
    }

    /// The numeric `id` of an entry that failed to decode, if it has one.
    pub fn raw_id(&self) -> Option<u64> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid { raw, .. } => raw.get("id").and_then(Value::as_u64),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Lenient<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(match T::deserialize(&raw) {
            Ok(value) => Self::Valid(value),
            Err(err) => Self::Invalid { raw, reason: err.to_string() },
        })
    }
}
