//! Biometric bridge
//!
//! A successful biometric capture unlocks a PIN sealed in device storage;
//! that PIN then goes through `PinAuthorizer::authorize` exactly like a
//! typed one. Biometrics only stand in for typing the secret, they never
//! mint a token on their own and never bypass the lockout.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::authorizer::PinAuthorizer;
use crate::error::{AuthError, Result};
use crate::types::{PinToken, SecurePin, UserId};

/// Reason reported when the user or the caller abandons a capture
pub const CANCELLED_REASON: &str = "cancelled";

/// Result of one device biometric prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    Success,
    Cancelled,
    DeviceError(String),
}

/// Device biometric capture (Face ID, fingerprint, ...)
#[async_trait]
pub trait BiometricCapture: Send + Sync {
    /// Whether the hardware is present and has biometrics enrolled
    async fn is_available(&self) -> bool;

    /// Show the prompt and wait for the user; may take arbitrarily long
    async fn capture(&self, prompt: &str) -> CaptureOutcome;
}

/// Device-local storage for the biometric-gated PIN
///
/// A store can report a user as enrolled while the sealed PIN has become
/// unreadable (e.g. the OS invalidated the key after a new fingerprint
/// was added).
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn is_enrolled(&self, user_id: &UserId) -> bool;

    async fn get_sealed_pin(&self, user_id: &UserId) -> Result<Option<SecurePin>>;

    async fn set_sealed_pin(&self, user_id: &UserId, pin: &SecurePin) -> Result<()>;

    async fn clear_sealed_pin(&self, user_id: &UserId) -> Result<()>;
}

/// Turns a biometric success into a PIN-equivalent authorization
pub struct BiometricBridge {
    authorizer: Arc<PinAuthorizer>,
    capture: Arc<dyn BiometricCapture>,
    secrets: Arc<dyn SecretStore>,
    prompt: String,
}

impl BiometricBridge {
    pub fn new(
        authorizer: Arc<PinAuthorizer>,
        capture: Arc<dyn BiometricCapture>,
        secrets: Arc<dyn SecretStore>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            authorizer,
            capture,
            secrets,
            prompt: prompt.into(),
        }
    }

    pub fn authorizer(&self) -> &Arc<PinAuthorizer> {
        &self.authorizer
    }

    /// Capture, unseal the PIN and authorize with it
    pub async fn authenticate_and_authorize(&self, user_id: &UserId) -> Result<PinToken> {
        self.authenticate_and_authorize_until(user_id, std::future::pending())
            .await
    }

    /// Like `authenticate_and_authorize`, abandoning the capture when `cancel` resolves
    ///
    /// An abandoned capture resolves to `BiometricFailed { reason: "cancelled" }`.
    pub async fn authenticate_and_authorize_until<F>(
        &self,
        user_id: &UserId,
        cancel: F,
    ) -> Result<PinToken>
    where
        F: Future<Output = ()> + Send,
    {
        let pin = self.unseal_pin(user_id, cancel).await?;
        self.authorizer.authorize(&pin).await
    }

    /// Capture, unseal the PIN and take a token for a single use
    ///
    /// See `PinAuthorizer::authorize_for_use`.
    pub async fn authenticate_for_use(&self, user_id: &UserId) -> Result<PinToken> {
        let pin = self.unseal_pin(user_id, std::future::pending()).await?;
        self.authorizer.authorize_for_use(&pin).await
    }

    async fn unseal_pin<F>(&self, user_id: &UserId, cancel: F) -> Result<SecurePin>
    where
        F: Future<Output = ()> + Send,
    {
        if !self.capture.is_available().await || !self.secrets.is_enrolled(user_id).await {
            debug!("Biometrics unavailable for {}", user_id);
            return Err(AuthError::BiometricUnavailable);
        }

        let outcome = tokio::select! {
            outcome = self.capture.capture(&self.prompt) => outcome,
            _ = cancel => CaptureOutcome::Cancelled,
        };

        match outcome {
            CaptureOutcome::Success => {}
            CaptureOutcome::Cancelled => {
                info!("Biometric capture cancelled for {}", user_id);
                return Err(AuthError::BiometricFailed {
                    reason: CANCELLED_REASON.to_string(),
                });
            }
            CaptureOutcome::DeviceError(reason) => {
                warn!("Biometric capture failed for {}: {}", user_id, reason);
                return Err(AuthError::BiometricFailed { reason });
            }
        }

        match self.secrets.get_sealed_pin(user_id).await {
            Ok(Some(pin)) => Ok(pin),
            Ok(None) => {
                warn!("Sealed PIN missing for {}", user_id);
                Err(AuthError::SetupIncomplete)
            }
            Err(e) => {
                warn!("Sealed PIN unreadable for {}: {}", user_id, e);
                Err(AuthError::SetupIncomplete)
            }
        }
    }

    /// Verify `pin` and seal it behind biometrics for `user_id`
    ///
    /// A wrong PIN counts as an attempt like any other. The token minted by
    /// the verification is discarded.
    pub async fn enroll(&self, user_id: &UserId, pin: &SecurePin) -> Result<()> {
        if !self.capture.is_available().await {
            return Err(AuthError::BiometricUnavailable);
        }

        match self.authorizer.authorize_for_use(pin).await {
            Ok(_) | Err(AuthError::TokenExpired) => {}
            Err(e) => return Err(e),
        }

        self.secrets.set_sealed_pin(user_id, pin).await?;
        info!("Biometric authorization enabled for {}", user_id);
        Ok(())
    }

    /// Remove the sealed PIN for `user_id`
    pub async fn disable(&self, user_id: &UserId) -> Result<()> {
        self.secrets.clear_sealed_pin(user_id).await?;
        info!("Biometric authorization disabled for {}", user_id);
        Ok(())
    }

    pub async fn is_enrolled(&self, user_id: &UserId) -> bool {
        self.secrets.is_enrolled(user_id).await
    }
}
