//! Round-up rules and the calculator that evaluates them
//!
//! A round-up is an extra amount derived from a payment and diverted to
//! savings. The rule picks one of three strategies:
//!
//! - fixed increment: round the payment up to the next multiple of `value`
//! - percentage: add `bps / 10000` of the payment, floored
//! - auto-adaptive: an injected advisor suggests an increment inside
//!   `[min, max]`, then behaves as a fixed increment
//!
//! An amount that is already an exact multiple of the increment is not
//! rounded up; the round-up is zero.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::money::Money;
use crate::BPS_DENOMINATOR;

/// How the round-up amount is derived from a payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RoundUpStrategy {
    FixedIncrement {
        value: Money,
    },
    Percentage {
        bps: u32,
    },
    AutoAdaptive {
        min_increment: Money,
        max_increment: Money,
        analysis_window_days: u32,
    },
}

impl RoundUpStrategy {
    /// Check the strategy's parameters are usable
    pub fn validate(&self) -> Result<()> {
        match *self {
            RoundUpStrategy::FixedIncrement { value } => {
                if !value.is_positive() {
                    return Err(Error::InvalidIncrement(format!(
                        "fixed increment must be positive, got {}",
                        value
                    )));
                }
            }
            RoundUpStrategy::Percentage { bps } => {
                if bps > BPS_DENOMINATOR {
                    return Err(Error::InvalidBasisPoints(bps));
                }
            }
            RoundUpStrategy::AutoAdaptive {
                min_increment,
                max_increment,
                ..
            } => {
                if !min_increment.is_positive() || min_increment > max_increment {
                    return Err(Error::InvalidIncrement(format!(
                        "adaptive bounds must satisfy 0 < min <= max, got [{}, {}]",
                        min_increment, max_increment
                    )));
                }
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match *self {
            RoundUpStrategy::FixedIncrement { value } => {
                format!("Round up to the nearest {}", value)
            }
            RoundUpStrategy::Percentage { bps } => {
                format!("Save {}.{:02}% of every payment", bps / 100, bps % 100)
            }
            RoundUpStrategy::AutoAdaptive {
                min_increment,
                max_increment,
                ..
            } => format!(
                "Smart round-up between {} and {}",
                min_increment, max_increment
            ),
        }
    }
}

/// Percentage split of a round-up between the main wallet and savings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AllocationDef")]
pub struct Allocation {
    main_pct: u8,
    savings_pct: u8,
}

#[derive(Deserialize)]
struct AllocationDef {
    main_pct: u8,
    savings_pct: u8,
}

impl TryFrom<AllocationDef> for Allocation {
    type Error = Error;

    fn try_from(def: AllocationDef) -> Result<Self> {
        Allocation::new(def.main_pct, def.savings_pct)
    }
}

impl Allocation {
    pub fn new(main_pct: u8, savings_pct: u8) -> Result<Self> {
        if u16::from(main_pct) + u16::from(savings_pct) != 100 {
            return Err(Error::InvalidAllocation {
                main_pct,
                savings_pct,
            });
        }
        Ok(Self {
            main_pct,
            savings_pct,
        })
    }

    /// Everything goes to savings
    pub fn all_savings() -> Self {
        Self {
            main_pct: 0,
            savings_pct: 100,
        }
    }

    pub fn main_pct(&self) -> u8 {
        self.main_pct
    }

    pub fn savings_pct(&self) -> u8 {
        self.savings_pct
    }
}

impl Default for Allocation {
    fn default() -> Self {
        Self::all_savings()
    }
}

/// A user's round-up configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundUpRule {
    pub enabled: bool,
    pub strategy: RoundUpStrategy,
    #[serde(default)]
    pub allocation: Allocation,
}

impl RoundUpRule {
    pub fn fixed(value: Money) -> Self {
        Self {
            enabled: true,
            strategy: RoundUpStrategy::FixedIncrement { value },
            allocation: Allocation::default(),
        }
    }

    pub fn percentage(bps: u32) -> Self {
        Self {
            enabled: true,
            strategy: RoundUpStrategy::Percentage { bps },
            allocation: Allocation::default(),
        }
    }

    pub fn auto_adaptive(
        min_increment: Money,
        max_increment: Money,
        analysis_window_days: u32,
    ) -> Self {
        Self {
            enabled: true,
            strategy: RoundUpStrategy::AutoAdaptive {
                min_increment,
                max_increment,
                analysis_window_days,
            },
            allocation: Allocation::default(),
        }
    }

    pub fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = allocation;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.strategy.validate()
    }
}

impl Default for RoundUpRule {
    fn default() -> Self {
        Self::fixed(Money::from_major(10)).disabled()
    }
}

/// Result of evaluating a rule against one amount
///
/// Derived per request and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundUpCalculation {
    pub input_amount: Money,
    pub round_up_amount: Money,
    pub strategy_used: RoundUpStrategy,
    /// Increment actually applied, for fixed and adaptive strategies
    pub increment_used: Option<Money>,
    pub description: String,
}

/// Suggests an increment for the auto-adaptive strategy
///
/// Implementations read whatever history they were built from; the
/// calculator clamps the suggestion into `[min, max]` regardless.
pub trait IncrementAdvisor: Send + Sync {
    fn suggest_increment(&self, min: Money, max: Money, window_days: u32) -> Money;
}

/// Advisor that sizes the increment from recent payment amounts
///
/// Takes a tenth of the median amount and snaps it up to a round step.
/// The caller supplies history already limited to the analysis window.
#[derive(Debug, Clone, Default)]
pub struct HistoryIncrementAdvisor {
    recent: Vec<Money>,
}

impl HistoryIncrementAdvisor {
    /// Round steps, in major units
    const STEPS: [i64; 8] = [1, 5, 10, 50, 100, 500, 1000, 5000];

    pub fn new(recent: Vec<Money>) -> Self {
        Self { recent }
    }

    fn median(&self) -> Option<Money> {
        let mut amounts: Vec<Money> = self
            .recent
            .iter()
            .copied()
            .filter(|a| a.is_positive())
            .collect();
        if amounts.is_empty() {
            return None;
        }
        amounts.sort_unstable();
        Some(amounts[amounts.len() / 2])
    }
}

impl IncrementAdvisor for HistoryIncrementAdvisor {
    fn suggest_increment(&self, min: Money, _max: Money, _window_days: u32) -> Money {
        let Some(median) = self.median() else {
            return min;
        };
        let target = median.minor() / 10;
        Self::STEPS
            .iter()
            .map(|&major| Money::from_major(major))
            .find(|step| step.minor() >= target)
            .unwrap_or(Money::from_major(Self::STEPS[Self::STEPS.len() - 1]))
    }
}

/// Pure evaluator of round-up rules
#[derive(Clone, Default)]
pub struct RoundUpCalculator {
    advisor: Option<Arc<dyn IncrementAdvisor>>,
}

impl fmt::Debug for RoundUpCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoundUpCalculator")
            .field("has_advisor", &self.advisor.is_some())
            .finish()
    }
}

impl RoundUpCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculator whose auto-adaptive strategy consults `advisor`
    pub fn with_advisor(advisor: Arc<dyn IncrementAdvisor>) -> Self {
        Self {
            advisor: Some(advisor),
        }
    }

    /// Evaluate `rule` against `amount`
    ///
    /// Disabled rules and non-positive amounts always yield zero.
    /// Parameters a validated rule would reject also yield zero rather
    /// than panicking.
    pub fn calculate(&self, rule: &RoundUpRule, amount: Money) -> RoundUpCalculation {
        let zero = |description: String| RoundUpCalculation {
            input_amount: amount,
            round_up_amount: Money::ZERO,
            strategy_used: rule.strategy.clone(),
            increment_used: None,
            description,
        };

        if !rule.enabled {
            return zero("Round-up disabled".to_string());
        }
        if !amount.is_positive() {
            return zero(rule.strategy.describe());
        }

        let (round_up_amount, increment_used) = match rule.strategy {
            RoundUpStrategy::FixedIncrement { value } => {
                (round_to_increment(amount, value), Some(value))
            }
            RoundUpStrategy::Percentage { bps } => (percentage_of(amount, bps), None),
            RoundUpStrategy::AutoAdaptive {
                min_increment,
                max_increment,
                analysis_window_days,
            } => {
                let (lo, hi) = if min_increment <= max_increment {
                    (min_increment, max_increment)
                } else {
                    (max_increment, min_increment)
                };
                let suggested = self
                    .advisor
                    .as_ref()
                    .map(|a| a.suggest_increment(lo, hi, analysis_window_days))
                    .unwrap_or(lo);
                let increment = suggested.clamp(lo, hi);
                (round_to_increment(amount, increment), Some(increment))
            }
        };

        RoundUpCalculation {
            input_amount: amount,
            round_up_amount,
            strategy_used: rule.strategy.clone(),
            increment_used,
            description: rule.strategy.describe(),
        }
    }
}

/// Distance from `amount` up to the next multiple of `increment`
fn round_to_increment(amount: Money, increment: Money) -> Money {
    if !increment.is_positive() {
        return Money::ZERO;
    }
    let rem = amount.minor() % increment.minor();
    if rem == 0 {
        Money::ZERO
    } else {
        Money::from_minor(increment.minor() - rem)
    }
}

fn percentage_of(amount: Money, bps: u32) -> Money {
    let bps = bps.min(BPS_DENOMINATOR);
    let scaled = i128::from(amount.minor()) * i128::from(bps) / i128::from(BPS_DENOMINATOR);
    // bps <= 10000 keeps the result within amount's range
    Money::from_minor(scaled.max(0) as i64)
}
