//! Placeholder second factor for transfers.
//!
//! This is NOT a one-time-password scheme: there is no time step, no counter
//! and no salt. A code is valid for a secret when the first six hex digits of
//! `sha256(secret_hex ++ code)` spell the code itself. Anything stronger should
//! come in as another [`SecondFactor`] implementation.

use core::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use familynet_core::{DomainError, DomainResult};

/// Checks a code supplied alongside a transfer.
pub trait SecondFactor {
    fn verify(&self, code: &str) -> bool;
}

/// Per-family secret: 32 random bytes, kept hex-encoded because the hex text
/// is what gets hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct TwoFactorSecret(String);

impl TwoFactorSecret {
    pub const BYTES: usize = 32;

    /// Number of hex digits in a code.
    pub const CODE_LEN: usize = 6;

    pub fn generate() -> Self {
        let mut bytes = [0u8; Self::BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Use a known secret (fixtures, replays). The text is kept as given.
    pub fn from_hex(secret: impl Into<String>) -> DomainResult<Self> {
        let secret = secret.into();
        let bytes = hex::decode(&secret)
            .map_err(|e| DomainError::validation(format!("two-factor secret: {e}")))?;
        if bytes.len() != Self::BYTES {
            return Err(DomainError::validation(format!(
                "two-factor secret: expected {} bytes, got {}",
                Self::BYTES,
                bytes.len()
            )));
        }
        Ok(Self(secret))
    }

    /// First six hex digits of `sha256(secret ++ seed)`.
    pub fn derive_code(&self, seed: &str) -> String {
        let digest = Sha256::new()
            .chain_update(self.0.as_bytes())
            .chain_update(seed.as_bytes())
            .finalize();
        hex::encode(&digest[..Self::CODE_LEN / 2])
    }
}

impl SecondFactor for TwoFactorSecret {
    fn verify(&self, code: &str) -> bool {
        self.derive_code(code) == code
    }
}

impl fmt::Debug for TwoFactorSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TwoFactorSecret(<redacted>)")
    }
}
