//! Akiba Core - Money, lockout and round-up primitives
//!
//! This crate holds the pure, deterministic half of transaction
//! authorization: the lockout table that drives PIN attempt counting, and
//! the round-up calculator plus allocation engine that every money-moving
//! flow uses to compose the amount it asks the user to authorize.
//!
//! Nothing in here performs I/O or touches a clock.

pub mod allocation;
pub mod error;
pub mod lockout;
pub mod money;
pub mod roundup;

pub use allocation::{AllocationEngine, ChargeBreakdown, RoundUpSplit};
pub use error::{Error, Result};
pub use lockout::{LockoutPolicy, LockoutTier};
pub use money::Money;
pub use roundup::{
    Allocation, HistoryIncrementAdvisor, IncrementAdvisor, RoundUpCalculation,
    RoundUpCalculator, RoundUpRule, RoundUpStrategy,
};

/// Basis points denominator (10_000 bps = 100%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Attempts shown to the user before the first lockout tier
pub const MAX_DISPLAYED_ATTEMPTS: u32 = 3;
