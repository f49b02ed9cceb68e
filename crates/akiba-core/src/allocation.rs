//! Composition of the amount a user is asked to authorize
//!
//! The engine evaluates the round-up, splits it between the main wallet and
//! savings, and adds up the total. Splits use integer division with the
//! remainder going to savings, so no minor unit is ever lost or created.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::money::Money;
use crate::roundup::{Allocation, RoundUpCalculation, RoundUpCalculator, RoundUpRule};

/// How a round-up amount is divided between destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundUpSplit {
    pub main_share: Money,
    pub savings_share: Money,
}

impl RoundUpSplit {
    /// Split `round_up` per `allocation`; the remainder lands in savings
    pub fn new(round_up: Money, allocation: Allocation) -> Self {
        let main = i128::from(round_up.minor()) * i128::from(allocation.main_pct()) / 100;
        // main_pct <= 100 keeps the share within round_up's range
        let main_share = Money::from_minor(main as i64);
        let savings_share = Money::from_minor(round_up.minor() - main_share.minor());
        Self {
            main_share,
            savings_share,
        }
    }

    pub fn total(&self) -> Money {
        Money::from_minor(self.main_share.minor() + self.savings_share.minor())
    }
}

/// Everything about a charge except the authorization token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeBreakdown {
    pub base_amount: Money,
    pub fee: Money,
    pub round_up: RoundUpCalculation,
    pub split: RoundUpSplit,
    pub total_to_authorize: Money,
}

impl ChargeBreakdown {
    pub fn round_up_amount(&self) -> Money {
        self.round_up.round_up_amount
    }
}

/// Builds charge previews from a base amount, a fee and a round-up rule
#[derive(Debug, Clone, Default)]
pub struct AllocationEngine {
    calculator: RoundUpCalculator,
}

impl AllocationEngine {
    pub fn new(calculator: RoundUpCalculator) -> Self {
        Self { calculator }
    }

    pub fn calculator(&self) -> &RoundUpCalculator {
        &self.calculator
    }

    /// Compose a charge
    ///
    /// `round_up_basis` is the amount the rule is evaluated against; payment
    /// flows pass the base amount.
    pub fn build_charge(
        &self,
        base_amount: Money,
        fee: Money,
        rule: &RoundUpRule,
        round_up_basis: Money,
    ) -> Result<ChargeBreakdown> {
        if base_amount.is_negative() {
            return Err(Error::NegativeAmount("base amount", base_amount));
        }
        if fee.is_negative() {
            return Err(Error::NegativeAmount("fee", fee));
        }

        let round_up = self.calculator.calculate(rule, round_up_basis);
        let split = RoundUpSplit::new(round_up.round_up_amount, rule.allocation);

        let total_to_authorize = base_amount
            .checked_add(fee)
            .and_then(|sum| sum.checked_add(round_up.round_up_amount))
            .ok_or(Error::AmountOverflow)?;

        Ok(ChargeBreakdown {
            base_amount,
            fee,
            round_up,
            split,
            total_to_authorize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_charge_totals() {
        let engine = AllocationEngine::default();
        let rule = RoundUpRule::percentage(500);
        let charge = engine
            .build_charge(
                Money::from_minor(12345),
                Money::from_minor(150),
                &rule,
                Money::from_minor(12345),
            )
            .unwrap();

        assert_eq!(charge.round_up_amount(), Money::from_minor(617));
        assert_eq!(charge.total_to_authorize, Money::from_minor(12345 + 150 + 617));
        assert_eq!(charge.split.savings_share, Money::from_minor(617));
        assert_eq!(charge.split.main_share, Money::ZERO);
    }

    #[test]
    fn test_split_remainder_goes_to_savings() {
        let allocation = Allocation::new(33, 67).unwrap();
        let split = RoundUpSplit::new(Money::from_minor(617), allocation);
        // 617 * 33 / 100 = 203.61 -> 203
        assert_eq!(split.main_share, Money::from_minor(203));
        assert_eq!(split.savings_share, Money::from_minor(414));
        assert_eq!(split.total(), Money::from_minor(617));

        let split = RoundUpSplit::new(Money::from_minor(1), Allocation::new(50, 50).unwrap());
        assert_eq!(split.main_share, Money::ZERO);
        assert_eq!(split.savings_share, Money::from_minor(1));
    }

    #[test]
    fn test_all_main_allocation() {
        let split = RoundUpSplit::new(Money::from_minor(999), Allocation::new(100, 0).unwrap());
        assert_eq!(split.main_share, Money::from_minor(999));
        assert_eq!(split.savings_share, Money::ZERO);
    }

    #[test]
    fn test_disabled_rule_adds_nothing() {
        let engine = AllocationEngine::default();
        let rule = RoundUpRule::fixed(Money::from_major(100)).disabled();
        let charge = engine
            .build_charge(
                Money::from_minor(12345),
                Money::from_minor(50),
                &rule,
                Money::from_minor(12345),
            )
            .unwrap();
        assert_eq!(charge.total_to_authorize, Money::from_minor(12395));
        assert_eq!(charge.split.total(), Money::ZERO);
    }

    #[test]
    fn test_rejects_negative_inputs() {
        let engine = AllocationEngine::default();
        let rule = RoundUpRule::default();
        assert_eq!(
            engine.build_charge(
                Money::from_minor(100),
                Money::from_minor(-1),
                &rule,
                Money::from_minor(100),
            ),
            Err(Error::NegativeAmount("fee", Money::from_minor(-1)))
        );
        assert!(engine
            .build_charge(Money::from_minor(-100), Money::ZERO, &rule, Money::from_minor(100))
            .is_err());
    }

    #[test]
    fn test_overflow_is_reported() {
        let engine = AllocationEngine::default();
        let rule = RoundUpRule::percentage(100);
        assert_eq!(
            engine.build_charge(
                Money::from_minor(i64::MAX),
                Money::ZERO,
                &rule,
                Money::from_minor(i64::MAX)
            ),
            Err(Error::AmountOverflow)
        );
    }
}
