//! Domain primitives: Address, CdpId, Ilk, Urn, TxHash.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Account or contract address (0x-prefixed hex string).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Create an Address from a string.
    pub fn new(addr: impl Into<String>) -> Self {
        Address(addr.into())
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The all-zero address, which contracts return for "not set".
    pub fn is_zero(&self) -> bool {
        self.0.eq_ignore_ascii_case(ZERO_ADDRESS)
    }

    /// Lowercased copy, as stored by the event indexer.
    pub fn to_lowercase(&self) -> Address {
        Address(self.0.to_lowercase())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric position id, assigned by the remote ledger at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CdpId(pub u64);

impl CdpId {
    pub fn new(id: u64) -> Self {
        CdpId(id)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// 0x-prefixed id zero-padded to 24 hex digits.
    pub fn to_id_bytes(&self) -> String {
        format!("0x{:0>24x}", self.0)
    }
}

impl fmt::Display for CdpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collateral kind tag, e.g. `ETH-A`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ilk(pub String);

/// An ilk that cannot be represented in, or recovered from, 32 bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IlkParseError {
    #[error("ilk is {0} bytes, limit is 32")]
    TooLong(usize),
    #[error("invalid bytes32 hex: {0}")]
    InvalidHex(String),
    #[error("ilk bytes are not valid UTF-8")]
    InvalidUtf8,
}

impl Ilk {
    pub fn new(ilk: impl Into<String>) -> Self {
        Ilk(ilk.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Right-zero-padded bytes32 hex encoding with 0x prefix.
    pub fn to_bytes32(&self) -> Result<String, IlkParseError> {
        let bytes = self.0.as_bytes();
        if bytes.len() > 32 {
            return Err(IlkParseError::TooLong(bytes.len()));
        }
        let mut padded = [0u8; 32];
        padded[..bytes.len()].copy_from_slice(bytes);
        Ok(format!("0x{}", hex::encode(padded)))
    }

    /// Decode a bytes32 hex value, dropping trailing zero padding.
    pub fn from_bytes32(raw: &str) -> Result<Self, IlkParseError> {
        let stripped = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes =
            hex::decode(stripped).map_err(|_| IlkParseError::InvalidHex(raw.to_string()))?;
        if bytes.len() > 32 {
            return Err(IlkParseError::TooLong(bytes.len()));
        }
        let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
        let text = std::str::from_utf8(&bytes[..end]).map_err(|_| IlkParseError::InvalidUtf8)?;
        Ok(Ilk(text.to_string()))
    }
}

impl fmt::Display for Ilk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage pointer the ledger keys a position's balances by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Urn(pub Address);

impl Urn {
    pub fn new(addr: impl Into<String>) -> Self {
        Urn(Address::new(addr))
    }

    pub fn address(&self) -> &Address {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        TxHash(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_bytes_padding() {
        assert_eq!(CdpId::new(1).to_id_bytes(), "0x000000000000000000000001");
        assert_eq!(CdpId::new(255).to_id_bytes(), "0x0000000000000000000000ff");
    }

    #[test]
    fn test_ilk_bytes32_roundtrip() {
        let ilk = Ilk::new("ETH-A");
        let encoded = ilk.to_bytes32().unwrap();
        assert_eq!(encoded.len(), 66);
        assert!(encoded.starts_with("0x4554482d41000000"));
        assert_eq!(Ilk::from_bytes32(&encoded).unwrap(), ilk);
    }

    #[test]
    fn test_ilk_too_long() {
        let ilk = Ilk::new("A".repeat(33));
        assert_eq!(ilk.to_bytes32(), Err(IlkParseError::TooLong(33)));
        assert_eq!(
            IlkParseError::TooLong(33).to_string(),
            "ilk is 33 bytes, limit is 32"
        );
    }

    #[test]
    fn test_ilk_invalid_hex() {
        assert!(matches!(
            Ilk::from_bytes32("0xzz"),
            Err(IlkParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::new(ZERO_ADDRESS).is_zero());
        assert!(!Address::new("0x00000000000000000000000000000000000000b1").is_zero());
    }

    #[test]
    fn test_cdp_id_ordering() {
        assert!(CdpId::new(3) < CdpId::new(10));
    }
}
