//! Integer money in minor currency units

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount of money as a count of minor units (cents)
///
/// No floating point is ever involved; all arithmetic is checked or
/// saturating at the call site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Minor units per major unit
    pub const MINOR_PER_MAJOR: i64 = 100;

    pub const fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Build from whole major units (e.g. shillings)
    pub const fn from_major(major: i64) -> Self {
        Self(major.saturating_mul(Self::MINOR_PER_MAJOR))
    }

    pub const fn minor(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl From<i64> for Money {
    fn from(minor: i64) -> Self {
        Self(minor)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let per = Self::MINOR_PER_MAJOR as u64;
        write!(f, "{}{}.{:02}", sign, abs / per, abs % per)
    }
}
