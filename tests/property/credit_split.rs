//! Credit shares across a batch.

use genchain::generation::split_credits;
use proptest::prelude::*;

#[test]
fn test_credit_split_sums_to_billed_amount() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&(0u32..10_000, 1usize..16), |(total, parts)| {
            let shares = split_credits(total, parts);
            prop_assert_eq!(shares.len(), parts);
            prop_assert_eq!(shares.iter().sum::<u32>(), total);
            let max = *shares.iter().max().unwrap();
            let min = *shares.iter().min().unwrap();
            prop_assert!(max - min <= 1);
            Ok(())
        })
        .unwrap();
}
