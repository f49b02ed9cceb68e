//! Per-user PIN session state
//!
//! `PinTokenStore` owns the attempt counter, the lock deadline and the
//! current token. It is a plain struct; the authorizer wraps it in a
//! short-held mutex so every read-modify-write happens inside one critical
//! section.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use akiba_core::LockoutPolicy;

use crate::clock::Clock;
use crate::types::PinToken;

/// Longest lock the store will schedule (100 years)
const MAX_LOCKOUT_SECS: i64 = 100 * 365 * 86_400;

/// Snapshot of a user's PIN session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSession {
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub current_token: Option<PinToken>,
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Holds the session's token, expiry and attempt/lockout counters
pub struct PinTokenStore {
    session: PinSession,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl PinTokenStore {
    /// Fresh session with zero attempts
    pub fn new(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            session: PinSession::default(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Count a wrong PIN and re-arm the lock if the policy says so
    pub fn record_failure(&mut self) {
        let now = self.clock.now();
        self.session.failed_attempts = self.session.failed_attempts.saturating_add(1);
        self.clear_token();

        let secs = self.policy.lockout_duration_for(self.session.failed_attempts);
        if secs > 0 {
            let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(MAX_LOCKOUT_SECS);
            self.session.locked_until = Some(now + Duration::seconds(secs));
            debug!(
                "PIN locked after {} failures for {}s",
                self.session.failed_attempts, secs
            );
        }
    }

    /// Reset counters and hold a freshly issued token
    pub fn record_success(&mut self, token: PinToken, ttl_secs: u64) {
        let now = self.clock.now();
        let ttl = i64::try_from(ttl_secs).unwrap_or(i64::MAX).min(MAX_LOCKOUT_SECS);
        self.clear_failures();
        self.session.current_token = Some(token);
        self.session.token_expires_at = Some(now + Duration::seconds(ttl));
    }

    /// Reset counters for a token that goes straight to its caller
    ///
    /// The token the session already holds, if any, stays where it is.
    /// Returns `None` when the new token is expired on arrival.
    pub fn record_success_for_use(&mut self, token: PinToken, ttl_secs: u64) -> Option<PinToken> {
        self.clear_failures();
        (ttl_secs > 0).then_some(token)
    }

    /// Lock deadline, only while it is still in the future
    pub fn active_lock(&self) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.session.locked_until.filter(|&until| until > now)
    }

    pub fn is_locked(&self) -> bool {
        self.active_lock().is_some()
    }

    /// Seconds until unlock, rounded up for countdown display
    pub fn remaining_lock_seconds(&self) -> u64 {
        let Some(until) = self.session.locked_until else {
            return 0;
        };
        let millis = (until - self.clock.now()).num_milliseconds();
        if millis <= 0 {
            0
        } else {
            (millis as u64).div_ceil(1000)
        }
    }

    pub fn failed_attempts(&self) -> u32 {
        self.session.failed_attempts
    }

    /// The current token if it has not expired
    pub fn current_token(&self) -> Option<&PinToken> {
        if self.token_live() {
            self.session.current_token.as_ref()
        } else {
            None
        }
    }

    /// Take the current token, leaving none behind
    ///
    /// Returns `None` if the token has expired.
    pub fn consume_token(&mut self) -> Option<PinToken> {
        let live = self.token_live();
        let token = self.session.current_token.take();
        self.session.token_expires_at = None;
        token.filter(|_| live)
    }

    /// Logout: zero attempts, drop lock and token
    pub fn reset(&mut self) {
        self.session = PinSession::default();
    }

    /// Copy of the session with expired state normalized away
    pub fn snapshot(&self) -> PinSession {
        let live = self.token_live();
        PinSession {
            failed_attempts: self.session.failed_attempts,
            locked_until: self.active_lock(),
            current_token: self.session.current_token.clone().filter(|_| live),
            token_expires_at: self.session.token_expires_at.filter(|_| live),
        }
    }

    fn token_live(&self) -> bool {
        self.session.current_token.is_some()
            && self
                .session
                .token_expires_at
                .is_some_and(|expires| expires > self.clock.now())
    }

    fn clear_failures(&mut self) {
        self.session.failed_attempts = 0;
        self.session.locked_until = None;
    }

    fn clear_token(&mut self) {
        self.session.current_token = None;
        self.session.token_expires_at = None;
    }
}
