use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest as _, Sha256};

use crate::error::CanonicalError;
use crate::jcs::{canonicalize, canonicalize_serializable};

/// Identifier of the digest algorithm. Changing it changes every governance
/// hash, so it is versioned together with the gate.
pub const DIGEST_ALGORITHM: &str = "sha256";

/// A SHA-256 digest over canonical bytes. Displays as lowercase hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = CanonicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| CanonicalError::InvalidDigest {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        let array: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CanonicalError::InvalidDigest {
                value: s.to_string(),
                reason: "expected 32 bytes".into(),
            })?;
        Ok(Digest(array))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest of raw bytes.
pub fn digest_bytes(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Digest of the canonical serialization of a JSON value.
pub fn digest(value: &Value) -> Result<Digest, CanonicalError> {
    Ok(digest_bytes(&canonicalize(value)?))
}

/// Digest of the canonical serialization of any serializable value.
pub fn digest_serializable<T: Serialize>(value: &T) -> Result<Digest, CanonicalError> {
    Ok(digest_bytes(&canonicalize_serializable(value)?))
}
