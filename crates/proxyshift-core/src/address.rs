use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A 20-byte account or contract address, rendered as `0x`-prefixed lowercase hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; 20]);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be 20 bytes, got {len} hex characters: {value}")]
    InvalidLength { value: String, len: usize },
    #[error("address contains invalid hex: {0}")]
    InvalidHex(String),
}

impl Address {
    pub const LEN: usize = 20;

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Takes the trailing 20 bytes of a 32-byte storage word.
    pub fn from_word(word: &[u8; 32]) -> Self {
        let mut bytes = [0_u8; 20];
        bytes.copy_from_slice(&word[12..]);
        Self(bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let Some(digits) = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
        else {
            return Err(AddressParseError::MissingPrefix(value.to_string()));
        };
        if digits.len() != Self::LEN * 2 {
            return Err(AddressParseError::InvalidLength {
                value: value.to_string(),
                len: digits.len(),
            });
        }

        let mut bytes = [0_u8; 20];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|_| AddressParseError::InvalidHex(value.to_string()))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_case_checksum_form() {
        let address: Address = "0xAbC0000000000000000000000000000000000001"
            .parse()
            .expect("address must parse");
        assert_eq!(
            address.to_string(),
            "0xabc0000000000000000000000000000000000001"
        );
    }

    #[test]
    fn rejects_short_and_unprefixed_values() {
        assert!(matches!(
            "abc".parse::<Address>(),
            Err(AddressParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            "0x1234".parse::<Address>(),
            Err(AddressParseError::InvalidLength { len: 4, .. })
        ));
        assert!(matches!(
            "0xzz00000000000000000000000000000000000000".parse::<Address>(),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_word_keeps_low_order_bytes() {
        let mut word = [0xff_u8; 32];
        word[12..].copy_from_slice(&[0x11; 20]);
        assert_eq!(Address::from_word(&word), Address::new([0x11; 20]));
    }
}
