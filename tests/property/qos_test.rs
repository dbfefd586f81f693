// tests/property/qos_test.rs

//! Property-based tests for the QoS governor's value parser and fold.

use proptest::prelude::*;
use spineldb::core::qos::Limits;
use spineldb::core::qos::limits::{format_memory, parse_memory};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        ..ProptestConfig::default()
    })]

    /// `format_memory` always produces a literal `parse_memory` accepts back
    /// to the same byte count, for any whole-kilobyte quantity a catalog
    /// entry can actually hold (`parse_memory`'s unit is kilobytes).
    #[test]
    fn format_memory_output_reparses_to_the_same_value(kb in 0u64..=(u32::MAX as u64)) {
        let bytes = kb * 1024;
        let rendered = format_memory(bytes);
        let reparsed_kb = parse_memory(&rendered).expect("format_memory output must parse");
        prop_assert_eq!(reparsed_kb as u64, kb);
    }

    /// Any accepted suffix multiplies the same base magnitude consistently.
    #[test]
    fn parse_memory_suffix_multipliers_are_consistent(magnitude in 0i64..=1_000_000i64) {
        let plain = parse_memory(&magnitude.to_string()).unwrap();
        let kb = parse_memory(&format!("{magnitude}k")).unwrap();
        let mb = parse_memory(&format!("{magnitude}m")).unwrap();
        let gb = parse_memory(&format!("{magnitude}g")).unwrap();
        prop_assert_eq!(plain, magnitude * 1024);
        prop_assert_eq!(kb, magnitude * 1024);
        prop_assert_eq!(mb, magnitude * 1024 * 1024);
        prop_assert_eq!(gb, magnitude * 1024 * 1024 * 1024);
    }

    /// `fold_most_restrictive` never produces a concurrency limit looser
    /// than either input: the fold is a lower bound, not an average or a
    /// pick-one.
    #[test]
    fn fold_most_restrictive_never_loosens_either_input(
        a in proptest::option::of(0u32..10_000),
        b in proptest::option::of(0u32..10_000),
    ) {
        let role = Limits { max_concurrent_tx: a, ..Limits::default() };
        let database = Limits { max_concurrent_tx: b, ..Limits::default() };
        let folded = Limits::fold_most_restrictive(&role, &database);

        if let Some(a) = a {
            prop_assert!(folded.max_concurrent_tx.unwrap() <= a);
        }
        if let Some(b) = b {
            prop_assert!(folded.max_concurrent_tx.unwrap() <= b);
        }
        if a.is_none() && b.is_none() {
            prop_assert!(folded.max_concurrent_tx.is_none());
        }
    }

    /// The fold is commutative: which side is called "role" and which is
    /// called "database" doesn't change the tightest-wins outcome.
    #[test]
    fn fold_most_restrictive_is_commutative(
        a in proptest::option::of(0u32..10_000),
        b in proptest::option::of(0u32..10_000),
    ) {
        let x = Limits { max_concurrent_select: a, ..Limits::default() };
        let y = Limits { max_concurrent_select: b, ..Limits::default() };
        let xy = Limits::fold_most_restrictive(&x, &y);
        let yx = Limits::fold_most_restrictive(&y, &x);
        prop_assert_eq!(xy.max_concurrent_select, yx.max_concurrent_select);
    }
}
