#![no_main]

use libfuzzer_sys::fuzz_target;

use akiba_core::{LockoutPolicy, RoundUpRule};

fuzz_target!(|data: &[u8]| {
    // parsed rules may still be invalid; validate and round-trip must not panic
    if let Ok(rule) = serde_json::from_slice::<RoundUpRule>(data) {
        let _ = rule.validate();
        let json = serde_json::to_vec(&rule).unwrap();
        let again: RoundUpRule = serde_json::from_slice(&json).unwrap();
        assert_eq!(rule, again);
    }

    if let Ok(policy) = serde_json::from_slice::<LockoutPolicy>(data) {
        let mut previous = 0;
        for failures in 0..64 {
            let secs = policy.lockout_duration_for(failures);
            assert!(secs >= previous);
            previous = secs;
        }
    }
});
