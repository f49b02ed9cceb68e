//! PIN authorization state machine
//!
//! One `authorize` call is one attempt cycle:
//!
//! 1. Locked: fail with `PinLocked` before touching the verifier.
//! 2. Otherwise ask the verifier.
//! 3. Token: reset counters, hold the token, return it.
//! 4. Wrong PIN: count the failure, then `PinLocked` or `IncorrectPin`.
//! 5. Transport failure: `AuthorizationUnavailable`, counters untouched.
//!
//! Attempts queue on their own mutex, held across the verifier call, so
//! outcomes land in the order the verifier answered. Session state sits
//! behind a second mutex that is only taken for the lock check and for
//! recording the outcome; the accessors and `logout` never wait on the
//! network. Dropping an in-flight `authorize` future records nothing.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use akiba_core::LockoutPolicy;
use chrono::{DateTime, Utc};

use crate::clock::{Clock, SystemClock};
use crate::config::AuthConfig;
use crate::error::{AuthError, Result};
use crate::session::{PinSession, PinTokenStore};
use crate::types::{PinToken, SecurePin};
use crate::verifier::{CredentialVerifier, VerifyError};

/// What happens to a freshly issued token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Issue {
    /// Held in the session until someone consumes it
    Hold,
    /// Returned to the caller only, never stored
    Take,
}

/// Orchestrates PIN attempts against the session store
pub struct PinAuthorizer {
    attempts: Mutex<()>,
    state: Mutex<PinTokenStore>,
    verifier: Arc<dyn CredentialVerifier>,
    max_displayed_attempts: u32,
}

impl PinAuthorizer {
    pub fn new(
        store: PinTokenStore,
        verifier: Arc<dyn CredentialVerifier>,
        max_displayed_attempts: u32,
    ) -> Self {
        Self {
            attempts: Mutex::new(()),
            state: Mutex::new(store),
            verifier,
            max_displayed_attempts,
        }
    }

    /// Build from config on the given clock
    pub fn with_clock(
        config: &AuthConfig,
        verifier: Arc<dyn CredentialVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = PinTokenStore::new(config.lockout.clone(), clock);
        Self::new(store, verifier, config.max_displayed_attempts)
    }

    /// Build from config on the system clock
    pub fn from_config(config: &AuthConfig, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self::with_clock(config, verifier, Arc::new(SystemClock))
    }

    /// Run one attempt cycle for `candidate`
    pub async fn authorize(&self, candidate: &SecurePin) -> Result<PinToken> {
        self.attempt(candidate, Issue::Hold).await
    }

    /// Run one attempt cycle and take the token for a single use
    ///
    /// The token never enters the session, so a token some other caller is
    /// holding there is left alone. A token that is already expired when it
    /// arrives fails with `TokenExpired`.
    pub async fn authorize_for_use(&self, candidate: &SecurePin) -> Result<PinToken> {
        self.attempt(candidate, Issue::Take).await
    }

    async fn attempt(&self, candidate: &SecurePin, issue: Issue) -> Result<PinToken> {
        let _turn = self.attempts.lock().await;

        if let Some(unlock_at) = self.state.lock().await.active_lock() {
            debug!("Authorization refused while locked until {}", unlock_at);
            return Err(AuthError::PinLocked { unlock_at });
        }

        let verdict = self.verifier.verify(candidate).await;
        let mut store = self.state.lock().await;

        match verdict {
            Ok(issued) => {
                info!(
                    "PIN verified, token {} valid for {}s",
                    issued.token.fingerprint(),
                    issued.ttl_secs
                );
                match issue {
                    Issue::Hold => {
                        store.record_success(issued.token.clone(), issued.ttl_secs);
                        Ok(issued.token)
                    }
                    Issue::Take => store
                        .record_success_for_use(issued.token, issued.ttl_secs)
                        .ok_or_else(|| {
                            warn!("Issued token expired before use");
                            AuthError::TokenExpired
                        }),
                }
            }
            Err(VerifyError::WrongPin) => {
                store.record_failure();
                let failed = store.failed_attempts();
                if let Some(unlock_at) = store.active_lock() {
                    warn!("Incorrect PIN ({} failures), locked until {}", failed, unlock_at);
                    Err(AuthError::PinLocked { unlock_at })
                } else {
                    let attempts_remaining = self.max_displayed_attempts.saturating_sub(failed);
                    info!("Incorrect PIN, {} attempts remaining", attempts_remaining);
                    Err(AuthError::IncorrectPin { attempts_remaining })
                }
            }
            Err(VerifyError::Transport(reason)) => {
                warn!("Credential verifier unavailable: {}", reason);
                Err(AuthError::AuthorizationUnavailable(reason))
            }
        }
    }

    pub async fn is_locked(&self) -> bool {
        self.state.lock().await.is_locked()
    }

    pub async fn remaining_lock_seconds(&self) -> u64 {
        self.state.lock().await.remaining_lock_seconds()
    }

    pub async fn unlock_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.active_lock()
    }

    pub async fn failed_attempts(&self) -> u32 {
        self.state.lock().await.failed_attempts()
    }

    /// Take the session's token so it cannot be handed out twice
    pub async fn consume_token(&self) -> Option<PinToken> {
        self.state.lock().await.consume_token()
    }

    pub async fn session(&self) -> PinSession {
        self.state.lock().await.snapshot()
    }

    pub async fn lockout_policy(&self) -> LockoutPolicy {
        self.state.lock().await.policy().clone()
    }

    /// Drop all session state
    pub async fn logout(&self) {
        self.state.lock().await.reset();
        info!("PIN session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::mock::MockCredentialVerifier;
    use akiba_core::LockoutTier;

    const PIN: &str = "2468";

    fn setup(policy: LockoutPolicy) -> (PinAuthorizer, Arc<MockCredentialVerifier>, ManualClock) {
        let clock = ManualClock::starting_now();
        let verifier = Arc::new(MockCredentialVerifier::new(PIN));
        let config = AuthConfig {
            lockout: policy,
            ..Default::default()
        };
        let authorizer =
            PinAuthorizer::with_clock(&config, verifier.clone(), Arc::new(clock.clone()));
        (authorizer, verifier, clock)
    }

    fn pin(s: &str) -> SecurePin {
        SecurePin::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_correct_pin_issues_token() {
        let (authorizer, verifier, _clock) = setup(LockoutPolicy::reference());

        let token = authorizer.authorize(&pin(PIN)).await.unwrap();
        assert_eq!(verifier.calls(), 1);
        assert_eq!(authorizer.session().await.current_token, Some(token));
    }

    #[tokio::test]
    async fn test_incorrect_pin_counts_down() {
        let (authorizer, _verifier, _clock) = setup(LockoutPolicy::reference());

        assert_eq!(
            authorizer.authorize(&pin("0000")).await,
            Err(AuthError::IncorrectPin { attempts_remaining: 2 })
        );
        assert_eq!(
            authorizer.authorize(&pin("0000")).await,
            Err(AuthError::IncorrectPin { attempts_remaining: 1 })
        );
        assert!(matches!(
            authorizer.authorize(&pin("0000")).await,
            Err(AuthError::PinLocked { .. })
        ));
    }

    #[tokio::test]
    async fn test_locked_session_never_calls_verifier() {
        let (authorizer, verifier, clock) = setup(LockoutPolicy::reference());
        for _ in 0..3 {
            let _ = authorizer.authorize(&pin("0000")).await;
        }
        assert_eq!(verifier.calls(), 3);

        let first = authorizer.authorize(&pin(PIN)).await;
        clock.advance_secs(10);
        let second = authorizer.authorize(&pin("1111")).await;

        assert_eq!(verifier.calls(), 3);
        assert_eq!(first, second);
        assert_eq!(authorizer.failed_attempts().await, 3);
    }

    #[tokio::test]
    async fn test_lock_expires_and_success_resets() {
        let (authorizer, verifier, clock) = setup(LockoutPolicy::reference());
        for _ in 0..3 {
            let _ = authorizer.authorize(&pin("0000")).await;
        }
        assert!(authorizer.is_locked().await);

        clock.advance_secs(30);
        assert!(!authorizer.is_locked().await);
        assert!(authorizer.authorize(&pin(PIN)).await.is_ok());
        assert_eq!(verifier.calls(), 4);
        assert_eq!(authorizer.failed_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_failure_after_expiry_moves_up_the_table() {
        let (authorizer, _verifier, clock) = setup(LockoutPolicy::reference());
        for _ in 0..3 {
            let _ = authorizer.authorize(&pin("0000")).await;
        }
        clock.advance_secs(30);
        let _ = authorizer.authorize(&pin("0000")).await;
        assert_eq!(authorizer.remaining_lock_seconds().await, 30);

        clock.advance_secs(30);
        let _ = authorizer.authorize(&pin("0000")).await;
        assert_eq!(authorizer.failed_attempts().await, 5);
        assert_eq!(authorizer.remaining_lock_seconds().await, 300);
    }

    #[tokio::test]
    async fn test_transport_failure_never_counts() {
        let (authorizer, verifier, _clock) = setup(LockoutPolicy::reference());
        let _ = authorizer.authorize(&pin("0000")).await;
        let before = authorizer.failed_attempts().await;

        verifier.set_transport_down(true);
        for _ in 0..5 {
            assert!(matches!(
                authorizer.authorize(&pin("0000")).await,
                Err(AuthError::AuthorizationUnavailable(_))
            ));
        }
        assert_eq!(authorizer.failed_attempts().await, before);
        assert!(!authorizer.is_locked().await);
    }

    #[tokio::test]
    async fn test_single_tier_lock_reports_unlock_time() {
        let policy = LockoutPolicy::from_tiers(vec![LockoutTier::new(3, 30)]).unwrap();
        let (authorizer, _verifier, clock) = setup(policy);
        let start = clock.now();

        for _ in 0..2 {
            let _ = authorizer.authorize(&pin("0000")).await;
        }
        match authorizer.authorize(&pin("0000")).await {
            Err(AuthError::PinLocked { unlock_at }) => {
                assert_eq!(unlock_at, start + chrono::Duration::seconds(30));
            }
            other => panic!("expected lock, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_consume_and_logout() {
        let (authorizer, _verifier, _clock) = setup(LockoutPolicy::reference());
        let token = authorizer.authorize(&pin(PIN)).await.unwrap();

        assert_eq!(authorizer.consume_token().await, Some(token));
        assert!(authorizer.consume_token().await.is_none());

        let _ = authorizer.authorize(&pin("0000")).await;
        authorizer.logout().await;
        assert_eq!(authorizer.session().await, PinSession::default());
    }

    #[tokio::test]
    async fn test_authorize_for_use_keeps_session_empty() {
        let (authorizer, _verifier, _clock) = setup(LockoutPolicy::reference());
        let _ = authorizer.authorize(&pin("0000")).await;

        let token = authorizer.authorize_for_use(&pin(PIN)).await.unwrap();
        assert_eq!(token, PinToken::new("token-1"));
        assert_eq!(authorizer.failed_attempts().await, 0);
        assert!(authorizer.session().await.current_token.is_none());
    }

    #[tokio::test]
    async fn test_authorize_for_use_leaves_held_token() {
        let (authorizer, _verifier, _clock) = setup(LockoutPolicy::reference());
        let held = authorizer.authorize(&pin(PIN)).await.unwrap();

        let taken = authorizer.authorize_for_use(&pin(PIN)).await.unwrap();
        assert_ne!(taken, held);
        assert_eq!(authorizer.consume_token().await, Some(held));
    }

    #[tokio::test]
    async fn test_authorize_for_use_refuses_expired_token() {
        let verifier = Arc::new(MockCredentialVerifier::new(PIN).with_ttl(0));
        let authorizer = PinAuthorizer::with_clock(
            &AuthConfig::default(),
            verifier.clone(),
            Arc::new(ManualClock::starting_now()),
        );

        assert_eq!(
            authorizer.authorize_for_use(&pin(PIN)).await,
            Err(AuthError::TokenExpired)
        );
        assert_eq!(verifier.calls(), 1);
        assert_eq!(authorizer.failed_attempts().await, 0);
    }

    #[tokio::test]
    async fn test_accessors_answer_during_slow_verify() {
        let (authorizer, verifier, _clock) = setup(LockoutPolicy::reference());
        verifier.set_delay_ms(500);
        let authorizer = Arc::new(authorizer);

        let pending = {
            let authorizer = authorizer.clone();
            tokio::spawn(async move {
                authorizer.authorize(&SecurePin::new("0000").unwrap()).await
            })
        };
        while verifier.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let quick = std::time::Duration::from_millis(100);
        assert_eq!(
            tokio::time::timeout(quick, authorizer.remaining_lock_seconds()).await,
            Ok(0)
        );
        assert_eq!(tokio::time::timeout(quick, authorizer.is_locked()).await, Ok(false));
        assert!(tokio::time::timeout(quick, authorizer.session()).await.is_ok());
        assert!(tokio::time::timeout(quick, authorizer.logout()).await.is_ok());

        assert_eq!(
            pending.await.unwrap(),
            Err(AuthError::IncorrectPin { attempts_remaining: 2 })
        );
    }

    #[tokio::test]
    async fn test_concurrent_attempts_are_serialized() {
        let (authorizer, verifier, _clock) = setup(LockoutPolicy::reference());
        verifier.set_delay_ms(5);
        let authorizer = Arc::new(authorizer);

        let mut handles = Vec::new();
        for _ in 0..6 {
            let authorizer = authorizer.clone();
            handles.push(tokio::spawn(async move {
                authorizer.authorize(&SecurePin::new("0000").unwrap()).await
            }));
        }
        for handle in handles {
            let _ = handle.await.unwrap();
        }

        // exactly three reached the verifier before the lock engaged
        assert_eq!(verifier.calls(), 3);
        assert_eq!(authorizer.failed_attempts().await, 3);
        assert_eq!(verifier.max_in_flight(), 1);
    }
}
