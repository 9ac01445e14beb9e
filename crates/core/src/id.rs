//! Strongly-typed identifiers used across the domain.

use core::str::FromStr;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Name of a family (ledger participant). Unique within a network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FamilyName(String);

/// Identifier of an outstanding loan: 16 random bytes, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoanId(String);

macro_rules! impl_string_newtype {
    ($t:ty) => {
        impl $t {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_string_newtype!(FamilyName);
impl_string_newtype!(LoanId);

impl FamilyName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl From<&str> for FamilyName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FamilyName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl FromStr for FamilyName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(DomainError::invalid_id("FamilyName: name cannot be empty"));
        }
        Ok(Self::new(s))
    }
}

impl LoanId {
    /// Byte length of a generated identifier (before hex encoding).
    pub const BYTES: usize = 16;

    /// Draw a fresh identifier from the OS random generator.
    ///
    /// Randomness here buys uniqueness only.
    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

impl FromStr for LoanId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| DomainError::invalid_id(format!("LoanId: {e}")))?;
        if bytes.len() != Self::BYTES {
            return Err(DomainError::invalid_id(format!(
                "LoanId: expected {} bytes, got {}",
                Self::BYTES,
                bytes.len()
            )));
        }
        Ok(Self(hex::encode(bytes)))
    }
}
