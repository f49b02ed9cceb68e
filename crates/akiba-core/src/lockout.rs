//! Progressive lockout policy for PIN brute-force protection
//!
//! The policy is an ordered table of tiers. The tier that applies is the
//! one with the greatest threshold not exceeding the failure count. The
//! reference table:
//!
//! - 0-2 failures: no lockout (allow typos)
//! - 3-4 failures: 30 seconds
//! - 5-7 failures: 5 minutes
//! - 8+ failures: 30 minutes

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// One row of the lockout table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockoutTier {
    /// Failure count at which this tier starts applying
    pub attempt_threshold: u32,
    /// Lock duration once this tier applies
    pub lockout_seconds: u64,
}

impl LockoutTier {
    pub const fn new(attempt_threshold: u32, lockout_seconds: u64) -> Self {
        Self {
            attempt_threshold,
            lockout_seconds,
        }
    }
}

/// Progressive lockout policy
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "PolicyDef", into = "PolicyDef")]
pub struct LockoutPolicy {
    tiers: Vec<LockoutTier>,
    /// Failures per extra last-tier duration once past the last threshold.
    /// `None` caps at the last tier.
    escalation_block: Option<u32>,
}

#[derive(Serialize, Deserialize)]
struct PolicyDef {
    tiers: Vec<LockoutTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    escalation_block: Option<u32>,
}

impl TryFrom<PolicyDef> for LockoutPolicy {
    type Error = Error;

    fn try_from(def: PolicyDef) -> Result<Self> {
        let policy = Self::from_tiers(def.tiers)?;
        match def.escalation_block {
            Some(block) => policy.with_escalation(block),
            None => Ok(policy),
        }
    }
}

impl From<LockoutPolicy> for PolicyDef {
    fn from(policy: LockoutPolicy) -> Self {
        Self {
            tiers: policy.tiers,
            escalation_block: policy.escalation_block,
        }
    }
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self::reference()
    }
}

impl LockoutPolicy {
    /// The table used by the wallet's payment flows
    pub fn reference() -> Self {
        Self {
            tiers: vec![
                LockoutTier::new(3, 30),   // 3-4 failures: 30 seconds
                LockoutTier::new(5, 300),  // 5-7 failures: 5 minutes
                LockoutTier::new(8, 1800), // 8+ failures: 30 minutes
            ],
            escalation_block: None,
        }
    }

    /// Create a strict policy (locks out sooner, longer durations)
    pub fn strict() -> Self {
        Self {
            tiers: vec![
                LockoutTier::new(2, 60),    // 2 failures: 1 minute
                LockoutTier::new(3, 600),   // 3 failures: 10 minutes
                LockoutTier::new(4, 3600),  // 4 failures: 1 hour
                LockoutTier::new(5, 86400), // 5+ failures: 24 hours
            ],
            escalation_block: None,
        }
    }

    /// Create a lenient policy (more attempts allowed)
    pub fn lenient() -> Self {
        Self {
            tiers: vec![
                LockoutTier::new(5, 15),   // 5 failures: 15 seconds
                LockoutTier::new(6, 60),   // 6 failures: 1 minute
                LockoutTier::new(7, 300),  // 7 failures: 5 minutes
                LockoutTier::new(8, 1800), // 8+ failures: 30 minutes
            ],
            escalation_block: None,
        }
    }

    /// Build a policy from an explicit table
    ///
    /// Thresholds must start at 1 or above and strictly increase; durations
    /// must never decrease, so the resulting policy is monotonic.
    pub fn from_tiers(tiers: Vec<LockoutTier>) -> Result<Self> {
        let first = tiers
            .first()
            .ok_or_else(|| Error::InvalidLockoutTable("table is empty".to_string()))?;
        if first.attempt_threshold == 0 {
            return Err(Error::InvalidLockoutTable(
                "first threshold must be at least 1".to_string(),
            ));
        }
        for pair in tiers.windows(2) {
            if pair[1].attempt_threshold <= pair[0].attempt_threshold {
                return Err(Error::InvalidLockoutTable(format!(
                    "threshold {} does not increase past {}",
                    pair[1].attempt_threshold, pair[0].attempt_threshold
                )));
            }
            if pair[1].lockout_seconds < pair[0].lockout_seconds {
                return Err(Error::InvalidLockoutTable(format!(
                    "duration at {} failures is shorter than at {}",
                    pair[1].attempt_threshold, pair[0].attempt_threshold
                )));
            }
        }
        Ok(Self {
            tiers,
            escalation_block: None,
        })
    }

    /// Escalate past the last tier by one last-tier duration per `block` failures
    pub fn with_escalation(mut self, block: u32) -> Result<Self> {
        if block == 0 {
            return Err(Error::InvalidLockoutTable(
                "escalation block must be at least 1".to_string(),
            ));
        }
        self.escalation_block = Some(block);
        Ok(self)
    }

    pub fn tiers(&self) -> &[LockoutTier] {
        &self.tiers
    }

    /// Failure count at which the first lock applies
    pub fn first_threshold(&self) -> u32 {
        self.tiers.first().map_or(u32::MAX, |t| t.attempt_threshold)
    }

    /// Lock duration in whole seconds for the given failure count; 0 means unlocked
    pub fn lockout_duration_for(&self, failed_attempts: u32) -> u64 {
        let Some(tier) = self
            .tiers
            .iter()
            .rev()
            .find(|t| t.attempt_threshold <= failed_attempts)
        else {
            return 0;
        };

        let is_last = self
            .tiers
            .last()
            .is_some_and(|last| last.attempt_threshold == tier.attempt_threshold);

        match self.escalation_block {
            Some(block) if is_last => {
                let extra_blocks = (failed_attempts - tier.attempt_threshold) / block;
                tier.lockout_seconds
                    .saturating_mul(u64::from(extra_blocks).saturating_add(1))
            }
            _ => tier.lockout_seconds,
        }
    }

    /// Get the lockout duration for the given number of failed attempts
    /// Returns None if not yet locked out
    pub fn lockout_duration(&self, failed_attempts: u32) -> Option<Duration> {
        match self.lockout_duration_for(failed_attempts) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Check if this failure count triggers a lock
    pub fn is_locked(&self, failed_attempts: u32) -> bool {
        self.lockout_duration_for(failed_attempts) > 0
    }

    /// Get a human-readable description of the lockout state
    pub fn describe(&self, failed_attempts: u32) -> String {
        if let Some(duration) = self.lockout_duration(failed_attempts) {
            let secs = duration.as_secs();
            if secs < 60 {
                format!("Locked for {} seconds", secs)
            } else if secs < 3600 {
                format!("Locked for {} minutes", secs / 60)
            } else if secs < 86400 {
                format!("Locked for {} hours", secs / 3600)
            } else {
                format!("Locked for {} days", secs / 86400)
            }
        } else {
            format!(
                "{} attempts remaining",
                self.first_threshold().saturating_sub(failed_attempts)
            )
        }
    }
}
