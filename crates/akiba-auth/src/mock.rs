//! In-memory collaborators for tests, demos and platforms without hardware

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::biometric::{BiometricCapture, CaptureOutcome, SecretStore};
use crate::error::Result;
use crate::types::{IssuedToken, PinToken, SecurePin, UserId};
use crate::verifier::{CredentialVerifier, VerifyError};

/// Verifier that accepts one PIN and counts its calls
pub struct MockCredentialVerifier {
    pin: String,
    ttl_secs: u64,
    calls: AtomicUsize,
    issued: AtomicU64,
    transport_down: AtomicBool,
    delay_ms: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    last_pin: Mutex<Option<String>>,
}

impl MockCredentialVerifier {
    pub fn new(pin: &str) -> Self {
        Self {
            pin: pin.to_string(),
            ttl_secs: 120,
            calls: AtomicUsize::new(0),
            issued: AtomicU64::new(0),
            transport_down: AtomicBool::new(false),
            delay_ms: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_pin: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    /// Number of `verify` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of tokens issued so far
    pub fn tokens_issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }

    pub fn set_transport_down(&self, down: bool) {
        self.transport_down.store(down, Ordering::SeqCst);
    }

    /// Make every verify call take this long
    pub fn set_delay_ms(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    /// Highest number of verify calls that overlapped
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn last_pin(&self) -> Option<String> {
        self.last_pin.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl CredentialVerifier for MockCredentialVerifier {
    async fn verify(&self, pin: &SecurePin) -> std::result::Result<IssuedToken, VerifyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        *self.last_pin.lock().unwrap_or_else(|e| e.into_inner()) = Some(pin.as_str().to_string());

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.transport_down.load(Ordering::SeqCst) {
            return Err(VerifyError::Transport("connection reset".to_string()));
        }
        if pin.as_str() != self.pin {
            return Err(VerifyError::WrongPin);
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedToken {
            token: PinToken::new(format!("token-{}", n)),
            ttl_secs: self.ttl_secs,
        })
    }
}

/// Biometric capture with a scripted outcome
pub struct MockBiometricCapture {
    available: AtomicBool,
    hang: AtomicBool,
    outcome: Mutex<CaptureOutcome>,
    captures: AtomicUsize,
}

impl MockBiometricCapture {
    pub fn succeeding() -> Self {
        Self::with_outcome(CaptureOutcome::Success)
    }

    pub fn with_outcome(outcome: CaptureOutcome) -> Self {
        Self {
            available: AtomicBool::new(true),
            hang: AtomicBool::new(false),
            outcome: Mutex::new(outcome),
            captures: AtomicUsize::new(0),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_outcome(&self, outcome: CaptureOutcome) {
        *self.outcome.lock().unwrap_or_else(|e| e.into_inner()) = outcome;
    }

    /// Never answer, as if the user walked away from the prompt
    pub fn set_hang(&self, hang: bool) {
        self.hang.store(hang, Ordering::SeqCst);
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricCapture for MockBiometricCapture {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn capture(&self, _prompt: &str) -> CaptureOutcome {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.outcome.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Secret store kept in process memory
#[derive(Default)]
pub struct InMemorySecretStore {
    enrolled: Mutex<HashSet<UserId>>,
    pins: Mutex<HashMap<UserId, SecurePin>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lose the sealed PIN but keep the enrollment flag
    pub fn invalidate(&self, user_id: &UserId) {
        self.pins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn is_enrolled(&self, user_id: &UserId) -> bool {
        self.enrolled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(user_id)
    }

    async fn get_sealed_pin(&self, user_id: &UserId) -> Result<Option<SecurePin>> {
        Ok(self
            .pins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned())
    }

    async fn set_sealed_pin(&self, user_id: &UserId, pin: &SecurePin) -> Result<()> {
        self.pins
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.clone(), pin.clone());
        self.enrolled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.clone());
        Ok(())
    }

    async fn clear_sealed_pin(&self, user_id: &UserId) -> Result<()> {
        self.invalidate(user_id);
        self.enrolled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(user_id);
        Ok(())
    }
}
