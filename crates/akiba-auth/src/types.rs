//! Secrets and identifiers passed through authorization

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{AuthError, Result};

/// Minimum PIN length
pub const MIN_PIN_LENGTH: usize = 4;
/// Maximum PIN length
pub const MAX_PIN_LENGTH: usize = 8;

/// Identifier of the wallet user a session belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A PIN held in memory that is zeroed on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecurePin(String);

impl SecurePin {
    /// Validate and wrap a PIN typed by the user
    pub fn new(pin: impl Into<String>) -> Result<Self> {
        let pin = Self(pin.into());
        if pin.0.len() < MIN_PIN_LENGTH || pin.0.len() > MAX_PIN_LENGTH {
            return Err(AuthError::InvalidPinLength(MIN_PIN_LENGTH, MAX_PIN_LENGTH));
        }
        if !pin.0.chars().all(|c| c.is_ascii_digit()) {
            return Err(AuthError::InvalidPinFormat);
        }
        Ok(pin)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for SecurePin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurePin(****)")
    }
}

/// Short-lived credential returned by the verifier after a correct PIN
///
/// Opaque to this crate. Callers treat a token as consumed after one
/// authorization request.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PinToken(String);

impl PinToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the payment API only
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Loggable identifier: first 4 bytes of the token's SHA-256 as hex
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for PinToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinToken({})", self.fingerprint())
    }
}

/// A token plus the lifetime the verifier granted it
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: PinToken,
    pub ttl_secs: u64,
}
