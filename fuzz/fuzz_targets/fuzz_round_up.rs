#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use akiba_core::{Money, RoundUpCalculator, RoundUpRule, RoundUpStrategy};

#[derive(Debug, Arbitrary)]
enum Strategy {
    Fixed(i64),
    Percentage(u32),
    Adaptive { min: i64, max: i64, window: u32 },
}

#[derive(Debug, Arbitrary)]
struct Input {
    amount: i64,
    enabled: bool,
    strategy: Strategy,
}

fuzz_target!(|input: Input| {
    // rules are built unvalidated on purpose; calculate must cope
    let strategy = match input.strategy {
        Strategy::Fixed(v) => RoundUpStrategy::FixedIncrement {
            value: Money::from_minor(v),
        },
        Strategy::Percentage(bps) => RoundUpStrategy::Percentage { bps },
        Strategy::Adaptive { min, max, window } => RoundUpStrategy::AutoAdaptive {
            min_increment: Money::from_minor(min),
            max_increment: Money::from_minor(max),
            analysis_window_days: window,
        },
    };
    let rule = RoundUpRule {
        enabled: input.enabled,
        strategy: strategy.clone(),
        allocation: Default::default(),
    };

    let amount = Money::from_minor(input.amount);
    let calc = RoundUpCalculator::new().calculate(&rule, amount);

    assert!(!calc.round_up_amount.is_negative());
    if !input.enabled || !amount.is_positive() {
        assert_eq!(calc.round_up_amount, Money::ZERO);
    }

    match strategy {
        RoundUpStrategy::FixedIncrement { value } if value.is_positive() => {
            assert!(calc.round_up_amount < value);
        }
        RoundUpStrategy::Percentage { .. } => {
            assert!(calc.round_up_amount <= amount.max(Money::ZERO));
        }
        _ => {}
    }

    // pure: same input, same answer
    assert_eq!(calc, RoundUpCalculator::new().calculate(&rule, amount));
});
