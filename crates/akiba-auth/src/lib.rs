//! Akiba Auth - PIN and biometric authorization for money movement
//!
//! Every transfer, merchant payment, top-up and savings deposit needs a
//! short-lived PIN token. This crate issues those tokens.
//!
//! # Security Model
//!
//! - The credential verifier is the only judge of PIN correctness
//! - Progressive lockout protects against brute force
//! - A locked session never reaches the verifier
//! - Transport failures never count as wrong attempts
//! - Biometrics unseal a stored PIN and route it through the same
//!   verifier; they never mint tokens themselves
//! - Tokens are single-use and expire
//! - PINs and tokens are zeroized on drop and never logged

pub mod authorizer;
pub mod biometric;
pub mod clock;
pub mod config;
pub mod error;
pub mod mock;
pub mod pin_entry;
pub mod session;
pub mod types;
pub mod verifier;

pub use authorizer::PinAuthorizer;
pub use biometric::{BiometricBridge, BiometricCapture, CaptureOutcome, SecretStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use pin_entry::{PinEntryReceiver, PinEntryRequest, PinEntryRequester, PinSource};
pub use session::{PinSession, PinTokenStore};
pub use types::{IssuedToken, PinToken, SecurePin, UserId, MAX_PIN_LENGTH, MIN_PIN_LENGTH};
pub use verifier::{CredentialVerifier, LocalCredentialVerifier, VerifyError};
