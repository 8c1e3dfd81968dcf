//! 32-byte hash values and the pluggable hash function used for transaction ids and Merkle
//! nodes.

use std::fmt;
use std::str::FromStr;

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Error returned when parsing a hash from its hex representation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseHashError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("unexpected byte length {0}")]
    Length(usize),
}

/// Fixed-size 32-byte value: transaction ids, Merkle nodes, addresses, keys and signature words
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash32(pub [u8; 32]);

impl Hash32 {
    pub const ZERO: Hash32 = Hash32([0u8; 32]);

    /// Parse a hex string, with or without the `0x` prefix
    pub fn from_hex(hex: &str) -> Result<Self, ParseHashError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let bytes = hex::decode(hex)?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|bytes: Vec<u8>| ParseHashError::Length(bytes.len()))?;
        Ok(Self(bytes))
    }

    /// Hex representation with the `0x` prefix
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Hash32 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash32 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash32 {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash32({})", self.to_hex())
    }
}

impl Serialize for Hash32 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash32 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Hash32::from_hex(&s).map_err(DeError::custom)
    }
}

/// Hash function of the external chain.
///
/// Transaction ids, RCD hashes and every Merkle node are derived through this trait, so a
/// proof is always checked with the same primitive that produced it.
pub trait NodeHasher: fmt::Debug + Send + Sync {
    /// Hash arbitrary bytes
    fn digest(&self, data: &[u8]) -> Hash32;

    /// Hash the concatenation `left || right`
    fn combine(&self, left: &Hash32, right: &Hash32) -> Hash32 {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&left.0);
        buf[32..].copy_from_slice(&right.0);
        self.digest(&buf)
    }
}

/// SHA-256, the hash used throughout the Factom block structure
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl NodeHasher for Sha256Hasher {
    fn digest(&self, data: &[u8]) -> Hash32 {
        Hash32(Sha256::digest(data).into())
    }
}
