//! Authorization error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for authorization operations
pub type Result<T> = std::result::Result<T, AuthError>;

/// Every way an authorization attempt can end without a token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Session is locked; recoverable by waiting
    #[error("PIN entry locked until {unlock_at}")]
    PinLocked { unlock_at: DateTime<Utc> },

    /// Wrong secret; counts towards lockout
    #[error("Incorrect PIN ({attempts_remaining} attempts remaining)")]
    IncorrectPin { attempts_remaining: u32 },

    /// Verifier unreachable or erroring; never counts as an attempt
    #[error("Authorization unavailable: {0}")]
    AuthorizationUnavailable(String),

    /// Verifier issued a token whose lifetime was already over
    #[error("Authorization expired before use")]
    TokenExpired,

    /// Capture cancelled or failed on the device
    #[error("Biometric authentication failed: {reason}")]
    BiometricFailed { reason: String },

    /// Device cannot capture, or the user never enabled biometrics
    #[error("Biometric authentication not available")]
    BiometricUnavailable,

    /// Enrollment exists but the sealed PIN is gone
    #[error("Biometric setup incomplete - please re-enroll")]
    SetupIncomplete,

    /// The pending PIN entry was torn down before an answer arrived
    #[error("PIN entry cancelled")]
    EntryCancelled,

    #[error("PIN must be {0}-{1} digits")]
    InvalidPinLength(usize, usize),

    #[error("PIN must contain only digits")]
    InvalidPinFormat,

    #[error("Secret store error: {0}")]
    SecretStore(String),
}

impl AuthError {
    /// Whether manual PIN entry is a sensible next step after a biometric attempt
    pub fn allows_manual_fallback(&self) -> bool {
        matches!(
            self,
            AuthError::BiometricFailed { .. }
                | AuthError::BiometricUnavailable
                | AuthError::SetupIncomplete
                | AuthError::IncorrectPin { .. }
        )
    }
}
