//! Authorization configuration

use serde::{Deserialize, Serialize};

use akiba_core::{LockoutPolicy, MAX_DISPLAYED_ATTEMPTS};

/// Authorization settings for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lockout table
    pub lockout: LockoutPolicy,

    /// Attempts the UI counts down from before the first lock
    pub max_displayed_attempts: u32,

    /// Text shown in the biometric capture prompt
    pub biometric_prompt: String,

    /// Token lifetime granted by the local verifier
    pub local_token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            lockout: LockoutPolicy::reference(),
            max_displayed_attempts: MAX_DISPLAYED_ATTEMPTS,
            biometric_prompt: "Confirm payment".to_string(),
            local_token_ttl_secs: 120,
        }
    }
}

impl AuthConfig {
    /// Stricter lockout for high-value accounts
    pub fn strict() -> Self {
        Self {
            lockout: LockoutPolicy::strict(),
            max_displayed_attempts: 2,
            local_token_ttl_secs: 60,
            ..Default::default()
        }
    }
}
