//! Factoid transaction parameters and their canonical encoding.
//!
//! The transaction id that inclusion proofs terminate at is the hash of the full marshalled
//! transaction: version, timestamp, group counts, addresses with amounts, and the RCD/signature
//! blocks.

use serde::{de::Error as DeError, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::hash::{Hash32, NodeHasher};

/// Factoid transaction version byte
pub const TRANSACTION_VERSION: u8 = 0x02;
/// RCD type 1: single ed25519 public key
pub const RCD_TYPE_1: u8 = 0x01;
/// Timestamps are encoded on 6 bytes (milliseconds)
pub const MAX_TIMESTAMP: u64 = (1 << 48) - 1;
/// Each ed25519 signature is submitted as two 32-byte words
pub const SIGNATURE_WORDS_PER_KEY: usize = 2;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("timestamp {0:#x} does not fit in 48 bits")]
    TimestampOverflow(u64),
    #[error("expected 3 address counts (inputs, outputs, ec purchases), got {0}")]
    GroupCountLength(usize),
    #[error("address count {0} does not fit in one byte")]
    GroupCountOverflow(u32),
    #[error("address counts sum to {expected} but {actual} addresses were given")]
    AddressCountMismatch { expected: usize, actual: usize },
    #[error("{addresses} addresses but {amounts} amounts")]
    AmountCountMismatch { addresses: usize, amounts: usize },
    #[error("{inputs} inputs but {public_keys} public keys")]
    PublicKeyCountMismatch { inputs: usize, public_keys: usize },
    #[error("{public_keys} public keys require {expected} signature words, got {actual}")]
    SignatureCountMismatch {
        public_keys: usize,
        expected: usize,
        actual: usize,
    },
    #[error("input {index} address does not match the RCD of its public key")]
    RcdMismatch { index: usize },
}

/// Transaction fields as submitted by the booker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParams {
    /// Transaction timestamp in milliseconds, hex encoded on the wire (e.g. `0x016db650c90a`)
    #[serde(
        serialize_with = "serialize_hex_u64",
        deserialize_with = "deserialize_hex_u64"
    )]
    pub tx_timestamp: u64,
    /// Number of inputs, outputs and entry credit purchases
    pub addresses_count: Vec<u32>,
    /// Input, output and entry credit addresses, in that order
    pub addresses: Vec<Hash32>,
    /// One amount (factoshis) per address
    pub amounts: Vec<u64>,
    /// One public key per input
    pub public_keys: Vec<Hash32>,
    /// Two 32-byte words per public key
    pub signatures: Vec<Hash32>,
}

/// Structurally valid factoid transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoidTransaction {
    timestamp: u64,
    input_count: u8,
    output_count: u8,
    ec_purchase_count: u8,
    addresses: Vec<Hash32>,
    amounts: Vec<u64>,
    public_keys: Vec<Hash32>,
    signatures: Vec<Hash32>,
}

impl TryFrom<&TransactionParams> for FactoidTransaction {
    type Error = TransactionError;

    fn try_from(params: &TransactionParams) -> Result<Self, Self::Error> {
        if params.tx_timestamp > MAX_TIMESTAMP {
            return Err(TransactionError::TimestampOverflow(params.tx_timestamp));
        }

        let counts: [u32; 3] = params
            .addresses_count
            .as_slice()
            .try_into()
            .map_err(|_| TransactionError::GroupCountLength(params.addresses_count.len()))?;
        let [input_count, output_count, ec_purchase_count] = counts.map(u8::try_from);
        let (input_count, output_count, ec_purchase_count) =
            match (input_count, output_count, ec_purchase_count) {
                (Ok(i), Ok(o), Ok(e)) => (i, o, e),
                _ => {
                    let overflow = counts.into_iter().find(|c| *c > u8::MAX as u32);
                    return Err(TransactionError::GroupCountOverflow(
                        overflow.unwrap_or_default(),
                    ));
                }
            };

        let expected = input_count as usize + output_count as usize + ec_purchase_count as usize;
        if expected != params.addresses.len() {
            return Err(TransactionError::AddressCountMismatch {
                expected,
                actual: params.addresses.len(),
            });
        }
        if params.amounts.len() != params.addresses.len() {
            return Err(TransactionError::AmountCountMismatch {
                addresses: params.addresses.len(),
                amounts: params.amounts.len(),
            });
        }
        if params.public_keys.len() != input_count as usize {
            return Err(TransactionError::PublicKeyCountMismatch {
                inputs: input_count as usize,
                public_keys: params.public_keys.len(),
            });
        }
        let expected_signatures = params.public_keys.len() * SIGNATURE_WORDS_PER_KEY;
        if params.signatures.len() != expected_signatures {
            return Err(TransactionError::SignatureCountMismatch {
                public_keys: params.public_keys.len(),
                expected: expected_signatures,
                actual: params.signatures.len(),
            });
        }

        Ok(Self {
            timestamp: params.tx_timestamp,
            input_count,
            output_count,
            ec_purchase_count,
            addresses: params.addresses.clone(),
            amounts: params.amounts.clone(),
            public_keys: params.public_keys.clone(),
            signatures: params.signatures.clone(),
        })
    }
}

impl FactoidTransaction {
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// (address, amount) pairs spending into the transaction
    pub fn inputs(&self) -> impl Iterator<Item = (&Hash32, u64)> {
        self.group(0, self.input_count)
    }

    /// (address, amount) pairs receiving factoids
    pub fn outputs(&self) -> impl Iterator<Item = (&Hash32, u64)> {
        self.group(self.input_count as usize, self.output_count)
    }

    /// (address, amount) pairs buying entry credits
    pub fn ec_purchases(&self) -> impl Iterator<Item = (&Hash32, u64)> {
        let start = self.input_count as usize + self.output_count as usize;
        self.group(start, self.ec_purchase_count)
    }

    fn group(&self, start: usize, count: u8) -> impl Iterator<Item = (&Hash32, u64)> {
        let end = start + count as usize;
        self.addresses[start..end]
            .iter()
            .zip(self.amounts[start..end].iter().copied())
    }

    /// Total amount paid to `address` by the outputs group
    pub fn amount_paid_to(&self, address: &Hash32) -> u64 {
        self.outputs()
            .filter(|(output, _)| *output == address)
            .fold(0u64, |total, (_, amount)| total.saturating_add(amount))
    }

    /// Check that every input address is the RCD hash of the corresponding public key
    pub fn check_rcds(&self, hasher: &dyn NodeHasher) -> Result<(), TransactionError> {
        for (index, ((address, _), public_key)) in
            self.inputs().zip(&self.public_keys).enumerate()
        {
            if rcd_hash(public_key, hasher) != *address {
                return Err(TransactionError::RcdMismatch { index });
            }
        }
        Ok(())
    }

    /// Canonical marshalled form of the transaction
    pub fn marshal(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(10 + self.addresses.len() * 42 + self.public_keys.len() * 97);
        buf.push(TRANSACTION_VERSION);
        buf.extend_from_slice(&self.timestamp.to_be_bytes()[2..]);
        buf.extend_from_slice(&[self.input_count, self.output_count, self.ec_purchase_count]);

        for (address, amount) in self.addresses.iter().zip(&self.amounts) {
            encode_varint(*amount, &mut buf);
            buf.extend_from_slice(address.as_bytes());
        }

        for (public_key, signature) in self
            .public_keys
            .iter()
            .zip(self.signatures.chunks_exact(SIGNATURE_WORDS_PER_KEY))
        {
            buf.push(RCD_TYPE_1);
            buf.extend_from_slice(public_key.as_bytes());
            for word in signature {
                buf.extend_from_slice(word.as_bytes());
            }
        }

        buf
    }

    /// Transaction hash: the leaf of the factoid block body tree
    pub fn hash(&self, hasher: &dyn NodeHasher) -> Hash32 {
        hasher.digest(&self.marshal())
    }
}

/// RCD type 1 hash of an ed25519 public key, `H(H(0x01 || public_key))`: the factoid address
pub fn rcd_hash(public_key: &Hash32, hasher: &dyn NodeHasher) -> Hash32 {
    let mut rcd = [0u8; 33];
    rcd[0] = RCD_TYPE_1;
    rcd[1..].copy_from_slice(public_key.as_bytes());
    let first = hasher.digest(&rcd);
    hasher.digest(first.as_bytes())
}

/// Factom variable-length integer: big-endian base-128, continuation bit on all but the last
/// byte
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    let mut groups = [0u8; 10];
    let mut len = 0;
    loop {
        groups[len] = (value & 0x7f) as u8;
        len += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        buf.push(groups[i] | continuation);
    }
}

fn serialize_hex_u64<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format!("{value:#014x}"))
}

fn deserialize_hex_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let digits = s.strip_prefix("0x").unwrap_or(&s);
    u64::from_str_radix(digits, 16).map_err(DeError::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Sha256Hasher;

    fn h(hex: &str) -> Hash32 {
        Hash32::from_hex(hex).unwrap()
    }

    fn sample_params() -> TransactionParams {
        TransactionParams {
            tx_timestamp: 0x016db650c90a,
            addresses_count: vec![2, 1, 0],
            addresses: vec![
                h("0x77fd94eacd8191bef2b42cef6108eaeae28d1674354e169e88a9e6f0eefa29e8"),
                h("0x2d9723cd1d4f288ba4ab4f03974255f402913a8ebd7bb71b009481b08e566159"),
                h("0x50fc0b6f3cae9d7677bb1d84170cb595269216d0b381666999cf8d9663ccc637"),
            ],
            amounts: vec![18340956058, 18159420942, 36500000000],
            public_keys: vec![
                h("0x813f7e6a2d87d9918eae6866a5abe9fe2151a81a0cbd81f6f552898e5894c2fb"),
                h("0x51d3684db90b61283c08eabdd9d0660d43b5640f30787d0235dfc25c0a59afec"),
            ],
            signatures: vec![
                h("0x185b9985bddb3a38ea8c8841c304194068bfd208ae3fe36618633ed9e33e2b30"),
                h("0x3ee8a7536f59f3894f72f075b8dbeb50dd288e39b64a524b8231c43c8303cb0c"),
                h("0xbd566a110053fbd16d8c5b4ff7afb6c9e56551bbf95ff97206a72778e3495aa7"),
                h("0x979889c1cce941f663342ad501a794367ec0641155c4f4475b3e3a6509c09806"),
            ],
        }
    }

    #[test]
    fn test_transaction_hash() {
        let tx = FactoidTransaction::try_from(&sample_params()).unwrap();
        assert_eq!(
            tx.hash(&Sha256Hasher).to_hex(),
            "0x59c31965f38c8d48dd75c612145106d5cdbaf6d7096b748470d4f5d196de400e"
        );
        tx.check_rcds(&Sha256Hasher).unwrap();
        assert_eq!(tx.timestamp(), 0x016db650c90a);
        assert_eq!(tx.inputs().count(), 2);
        assert_eq!(tx.ec_purchases().count(), 0);
        assert_eq!(
            tx.amount_paid_to(&h(
                "0x50fc0b6f3cae9d7677bb1d84170cb595269216d0b381666999cf8d9663ccc637"
            )),
            36500000000
        );
    }

    #[test]
    fn test_marshal_layout() {
        let tx = FactoidTransaction::try_from(&sample_params()).unwrap();
        let bytes = tx.marshal();
        assert_eq!(&bytes[..10], &[0x02, 0x01, 0x6d, 0xb6, 0x50, 0xc9, 0x0a, 2, 1, 0]);
        // varint-prefixed addresses, then type + key + signature per input
        assert_eq!(bytes.len(), 10 + (5 + 32) + (5 + 32) + (6 + 32) + 2 * (1 + 32 + 64));
    }

    #[test]
    fn test_varint() {
        let encode = |v: u64| {
            let mut buf = Vec::new();
            encode_varint(v, &mut buf);
            buf
        };
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x81, 0x00]);
        assert_eq!(encode(300), vec![0x82, 0x2c]);
        assert_eq!(encode(u64::MAX).len(), 10);
    }

    #[test]
    fn test_structural_validation() {
        let mut params = sample_params();
        params.addresses_count = vec![2, 1];
        assert_eq!(
            FactoidTransaction::try_from(&params).unwrap_err(),
            TransactionError::GroupCountLength(2)
        );

        let mut params = sample_params();
        params.addresses_count = vec![2, 2, 0];
        assert!(matches!(
            FactoidTransaction::try_from(&params),
            Err(TransactionError::AddressCountMismatch { expected: 4, actual: 3 })
        ));

        let mut params = sample_params();
        params.addresses_count = vec![2, 256, 0];
        assert_eq!(
            FactoidTransaction::try_from(&params).unwrap_err(),
            TransactionError::GroupCountOverflow(256)
        );

        let mut params = sample_params();
        params.amounts.pop();
        assert!(matches!(
            FactoidTransaction::try_from(&params),
            Err(TransactionError::AmountCountMismatch { .. })
        ));

        let mut params = sample_params();
        params.signatures.pop();
        assert!(matches!(
            FactoidTransaction::try_from(&params),
            Err(TransactionError::SignatureCountMismatch { expected: 4, actual: 3, .. })
        ));

        let mut params = sample_params();
        params.public_keys.pop();
        params.signatures.truncate(2);
        assert!(matches!(
            FactoidTransaction::try_from(&params),
            Err(TransactionError::PublicKeyCountMismatch { inputs: 2, public_keys: 1 })
        ));

        let mut params = sample_params();
        params.tx_timestamp = 1 << 48;
        assert!(matches!(
            FactoidTransaction::try_from(&params),
            Err(TransactionError::TimestampOverflow(_))
        ));
    }

    #[test]
    fn test_rcd_mismatch() {
        let mut params = sample_params();
        params.public_keys.swap(0, 1);
        let tx = FactoidTransaction::try_from(&params).unwrap();
        assert_eq!(
            tx.check_rcds(&Sha256Hasher).unwrap_err(),
            TransactionError::RcdMismatch { index: 0 }
        );
    }

    #[test]
    fn test_params_json() {
        let json = serde_json::to_value(sample_params()).unwrap();
        assert_eq!(json["tx_timestamp"], "0x016db650c90a");
        let back: TransactionParams = serde_json::from_value(json).unwrap();
        assert_eq!(back, sample_params());
    }
}
