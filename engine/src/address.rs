//! # Account Addresses
//!
//! Defines the [`Address`] type used for every party the engine knows
//! about: funders, beneficiaries, token contracts, payout recipients, and
//! the custody account itself. An address is a raw 20-byte identifier,
//! rendered as `0x`-prefixed lowercase hex -- the same shape the external
//! token and verifier contracts use, so no translation happens at the
//! boundary.
//!
//! The zero address is load-bearing: a vault whose beneficiary is
//! [`Address::ZERO`] is a prize-pool vault by definition, and the zero
//! address is never a valid token, funder, or recipient.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 20-byte account identifier.
///
/// Two addresses with the same bytes are the same account -- there is no
/// chain-specific checksumming here; the engine compares raw bytes and
/// renders lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

/// Errors raised when parsing an address from its hex form.
///
/// `PartialEq` only: the wrapped [`hex::FromHexError`] does not
/// implement `Eq`.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AddressParseError {
    /// The string does not start with `0x`.
    #[error("address must start with 0x")]
    MissingPrefix,

    /// The hex payload is not exactly 40 characters / 20 bytes.
    #[error("address must be 20 bytes, got {0}")]
    BadLength(usize),

    /// The payload contains non-hex characters.
    #[error("invalid hex in address: {0}")]
    BadHex(#[from] hex::FromHexError),
}

impl Address {
    /// The all-zeroes address. Marks "no beneficiary" on prize-pool
    /// vaults and is rejected everywhere a real account is required.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Creates an `Address` from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 20-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns `true` if this is the zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Returns the `0x`-prefixed lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a `0x`-prefixed hex address.
    pub fn from_hex(s: &str) -> Result<Self, AddressParseError> {
        let payload = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or(AddressParseError::MissingPrefix)?;
        let bytes = hex::decode(payload)?;
        if bytes.len() != 20 {
            return Err(AddressParseError::BadLength(bytes.len()));
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Addresses serialize as their hex string so JSON payloads and logs stay
// human-readable, and so map keys are valid JSON object keys.
impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
