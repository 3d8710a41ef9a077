//! Core value types shared by the wallet, contract, and session layers.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::SessionError;

/// An externally-owned account address (20 bytes).
///
/// Parsed from `0x`-prefixed hex in any letter case. Equality is byte
/// equality, so two spellings of the same address compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address
    pub const ZERO: Address = Address([0u8; 20]);

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Shortened form for display, e.g. `0x7a6d...4ea6`
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl FromStr for Address {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| SessionError::InvalidInput(format!("address missing 0x prefix: {s}")))?;

        if digits.len() != 40 {
            return Err(SessionError::InvalidInput(format!(
                "address must have 40 hex digits, got {}",
                digits.len()
            )));
        }

        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| SessionError::InvalidInput(format!("invalid address {s}: {e}")))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl ChainId {
    /// Ethereum mainnet
    pub const MAINNET: ChainId = ChainId(1);
    /// Goerli testnet
    pub const GOERLI: ChainId = ChainId(5);
    /// Polygon mainnet
    pub const POLYGON: ChainId = ChainId(137);
    /// Sepolia testnet, where the registry is deployed
    pub const SEPOLIA: ChainId = ChainId(11_155_111);

    /// Parse a `0x`-prefixed hex quantity, as wallets report it
    pub fn from_hex(s: &str) -> Result<Self, SessionError> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| SessionError::InvalidInput(format!("chain id missing 0x prefix: {s}")))?;
        u64::from_str_radix(digits, 16)
            .map(ChainId)
            .map_err(|e| SessionError::InvalidInput(format!("invalid chain id {s}: {e}")))
    }

    /// Hex quantity form, e.g. `0xaa36a7`
    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }

    /// Human readable network name
    pub fn name(&self) -> &'static str {
        match *self {
            Self::MAINNET => "Ethereum Mainnet",
            Self::GOERLI => "Goerli Testnet",
            Self::POLYGON => "Polygon Mainnet",
            Self::SEPOLIA => "Sepolia Testnet",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_hex(), self.name())
    }
}

/// Case status, in the order the contract encodes it.
///
/// The numeric discriminant is the on-chain status code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum CaseStatus {
    #[default]
    Registered = 0,
    Investigating = 1,
    Closed = 2,
}

impl CaseStatus {
    /// All statuses in table order
    pub const ALL: [CaseStatus; 3] = [
        CaseStatus::Registered,
        CaseStatus::Investigating,
        CaseStatus::Closed,
    ];

    /// Map an on-chain status code
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// On-chain status code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Map a display name; unknown names are rejected rather than encoded
    pub fn from_name(name: &str) -> Result<Self, SessionError> {
        match name.trim().to_lowercase().as_str() {
            "registered" | "reported" => Ok(Self::Registered),
            "investigating" => Ok(Self::Investigating),
            "closed" | "resolved" => Ok(Self::Closed),
            _ => Err(SessionError::InvalidStatus(name.to_string())),
        }
    }

    /// Display name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Investigating => "Investigating",
            Self::Closed => "Closed",
        }
    }

    /// The status an administrator would move this case to next
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Registered => Some(Self::Investigating),
            Self::Investigating => Some(Self::Closed),
            Self::Closed => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN: &str = "0x7a6DE621cAc809A1A850F091a2e4eDac33054Ea6";

    #[test]
    fn test_address_case_insensitive() {
        let mixed: Address = ADMIN.parse().unwrap();
        let lower: Address = ADMIN.to_lowercase().parse().unwrap();
        let upper: Address = format!("0x{}", &ADMIN[2..].to_uppercase()).parse().unwrap();

        assert_eq!(mixed, lower);
        assert_eq!(mixed, upper);
        assert_eq!(mixed.to_string(), ADMIN.to_lowercase());
    }

    #[test]
    fn test_address_rejects_malformed() {
        assert!("7a6DE621cAc809A1A850F091a2e4eDac33054Ea6".parse::<Address>().is_err());
        assert!("0x1234".parse::<Address>().is_err());
        assert!("0xzz6DE621cAc809A1A850F091a2e4eDac33054Ea6".parse::<Address>().is_err());
    }

    #[test]
    fn test_address_short() {
        let addr: Address = ADMIN.parse().unwrap();
        assert_eq!(addr.short(), "0x7a6d...4ea6");
    }

    #[test]
    fn test_address_serde() {
        let addr: Address = ADMIN.parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", ADMIN.to_lowercase()));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_chain_id_hex() {
        assert_eq!(ChainId::from_hex("0xaa36a7").unwrap(), ChainId::SEPOLIA);
        assert_eq!(ChainId::SEPOLIA.to_hex(), "0xaa36a7");
        assert_eq!(ChainId::from_hex("0x89").unwrap().name(), "Polygon Mainnet");
        assert_eq!(ChainId(31337).name(), "Unknown");
        assert!(ChainId::from_hex("aa36a7").is_err());
    }

    #[test]
    fn test_status_table() {
        assert_eq!(CaseStatus::from_code(0), Some(CaseStatus::Registered));
        assert_eq!(CaseStatus::from_code(1), Some(CaseStatus::Investigating));
        assert_eq!(CaseStatus::from_code(2), Some(CaseStatus::Closed));
        assert_eq!(CaseStatus::from_code(3), None);
        assert_eq!(CaseStatus::default(), CaseStatus::Registered);

        for status in CaseStatus::ALL {
            assert_eq!(CaseStatus::from_code(status.code()), Some(status));
            assert_eq!(CaseStatus::from_name(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn test_status_names() {
        assert_eq!(CaseStatus::from_name("reported").unwrap(), CaseStatus::Registered);
        assert_eq!(CaseStatus::from_name("Resolved").unwrap(), CaseStatus::Closed);
        assert!(matches!(
            CaseStatus::from_name("Dismissed"),
            Err(SessionError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_status_ordering() {
        assert!(CaseStatus::Registered < CaseStatus::Investigating);
        assert!(CaseStatus::Investigating < CaseStatus::Closed);
        assert_eq!(CaseStatus::Registered.next(), Some(CaseStatus::Investigating));
        assert_eq!(CaseStatus::Closed.next(), None);
        assert!(CaseStatus::Closed.is_terminal());
    }
}
