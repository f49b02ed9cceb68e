#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use akiba_core::{Allocation, AllocationEngine, Money, RoundUpRule, RoundUpSplit};

#[derive(Debug, Arbitrary)]
struct Input {
    base: i64,
    fee: i64,
    increment: i64,
    main_pct: u8,
    round_up: i64,
}

fuzz_target!(|input: Input| {
    let main_pct = input.main_pct % 101;
    let allocation = match Allocation::new(main_pct, 100 - main_pct) {
        Ok(a) => a,
        Err(_) => return,
    };

    // any non-negative round-up splits without losing a unit
    let round_up = Money::from_minor(input.round_up.max(0));
    let split = RoundUpSplit::new(round_up, allocation);
    assert_eq!(split.total(), round_up);
    assert!(!split.main_share.is_negative());
    assert!(!split.savings_share.is_negative());

    let rule = RoundUpRule::fixed(Money::from_minor(input.increment)).with_allocation(allocation);
    let base = Money::from_minor(input.base);
    let fee = Money::from_minor(input.fee);

    if let Ok(charge) = AllocationEngine::default().build_charge(base, fee, &rule, base) {
        assert_eq!(charge.split.total(), charge.round_up_amount());
        assert_eq!(
            charge.total_to_authorize.minor(),
            charge.base_amount.minor() + charge.fee.minor() + charge.round_up_amount().minor()
        );
    }
});
