//! Credential verification
//!
//! The verifier is the single source of truth for "is this PIN correct".
//! It either issues a token, rejects the PIN, or fails in transport; only
//! a rejection ever counts as a wrong attempt.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use rand::RngCore;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::error::{AuthError, Result};
use crate::types::{IssuedToken, PinToken, SecurePin};

/// Non-token outcomes of a verify call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The verifier looked at the PIN and said no
    #[error("wrong PIN")]
    WrongPin,

    /// No verdict: network, timeout or server failure
    #[error("transport failure: {0}")]
    Transport(String),
}

/// External service that checks a PIN and issues tokens
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, pin: &SecurePin) -> std::result::Result<IssuedToken, VerifyError>;
}

/// In-process verifier backed by an Argon2id hash
///
/// Used for development and simulation where no backend is reachable.
pub struct LocalCredentialVerifier {
    hash: String,
    ttl_secs: u64,
    online: AtomicBool,
}

impl LocalCredentialVerifier {
    pub fn new(pin: &SecurePin, ttl_secs: u64) -> Result<Self> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(pin.as_bytes(), &salt)
            .map_err(|e| AuthError::SecretStore(format!("Failed to hash PIN: {}", e)))?
            .to_string();

        Ok(Self {
            hash,
            ttl_secs,
            online: AtomicBool::new(true),
        })
    }

    /// Simulate the backend going away (or coming back)
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn issue_token(&self) -> IssuedToken {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        IssuedToken {
            token: PinToken::new(hex::encode(bytes)),
            ttl_secs: self.ttl_secs,
        }
    }
}

#[async_trait]
impl CredentialVerifier for LocalCredentialVerifier {
    async fn verify(&self, pin: &SecurePin) -> std::result::Result<IssuedToken, VerifyError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(VerifyError::Transport("verifier offline".to_string()));
        }

        let parsed = PasswordHash::new(&self.hash)
            .map_err(|e| VerifyError::Transport(format!("Invalid stored hash: {}", e)))?;

        if Argon2::default().verify_password(pin.as_bytes(), &parsed).is_ok() {
            Ok(self.issue_token())
        } else {
            Err(VerifyError::WrongPin)
        }
    }
}
