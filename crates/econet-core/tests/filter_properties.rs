//! Property-based tests for the filter laws.
//!
//! The filters make quantitative promises: throttle bounds the forward
//! rate, debounce requires an unbroken streak, on_change composes
//! idempotently, and aggregate never invents or loses input. These
//! tests check them against arbitrary call sequences.

use std::time::Duration;

use econet_core::{FilterChain, filters};
use econet_proto::Value;
use proptest::prelude::*;
use tokio::time::Instant;

#[test]
fn prop_on_change_is_idempotent() {
    proptest!(|(inputs in prop::collection::vec(-5i64..5, 0..64))| {
        let mut single = FilterChain::new().then(filters::on_change());
        let mut double =
            FilterChain::new().then(filters::on_change()).then(filters::on_change());
        let now = Instant::now();

        for input in inputs {
            let value = Value::Int(input);
            // PROPERTY: composing on_change with itself changes nothing.
            prop_assert_eq!(single.feed(&value, now), double.feed(&value, now));
        }
    });
}

#[test]
fn prop_throttle_bounds_the_forward_rate() {
    proptest!(|(
        window_secs in 1u64..30,
        offsets in prop::collection::vec(0u64..600, 1..128),
    )| {
        let window = Duration::from_secs(window_secs);
        let mut throttle = filters::throttle(window);
        let start = Instant::now();

        let mut offsets = offsets;
        offsets.sort_unstable();
        let span = *offsets.last().unwrap_or(&0);

        let mut forwarded = 0u64;
        for offset in &offsets {
            let at = start + Duration::from_secs(*offset);
            if throttle.feed(&Value::Int(1), at).is_some() {
                forwarded += 1;
            }
        }

        // PROPERTY: at most ceil(span / window) + 1 forwards over the
        // whole sequence.
        let bound = span.div_ceil(window_secs) + 1;
        prop_assert!(
            forwarded <= bound,
            "{forwarded} forwards over {span}s exceeds bound {bound}"
        );
    });
}

#[test]
fn prop_debounce_forwards_only_on_a_streak() {
    proptest!(|(
        required in 1u32..6,
        inputs in prop::collection::vec(0i64..3, 1..64),
    )| {
        let mut debounce = filters::debounce(required);
        let now = Instant::now();

        for (position, input) in inputs.iter().enumerate() {
            let forwarded = debounce.feed(&Value::Int(*input), now).is_some();

            // PROPERTY: forwarded iff the last `required` inputs are equal.
            let streak_ok = position + 1 >= required as usize
                && inputs[position + 1 - required as usize..=position]
                    .iter()
                    .all(|v| v == input);
            prop_assert_eq!(forwarded, streak_ok, "at position {}", position);
        }
    });
}

#[test]
fn prop_aggregate_conserves_the_sum() {
    proptest!(|(
        window_secs in 1u64..20,
        inputs in prop::collection::vec((0u64..120, -100i64..100), 1..64),
    )| {
        let window = Duration::from_secs(window_secs);
        let mut aggregate = filters::aggregate(window);
        let start = Instant::now();

        let mut inputs = inputs;
        inputs.sort_unstable_by_key(|(offset, _)| *offset);

        let mut fed = 0.0f64;
        let mut forwarded = 0.0f64;
        for (offset, value) in &inputs {
            fed += *value as f64;
            let at = start + Duration::from_secs(*offset);
            if let Some(Value::Float(sum)) = aggregate.feed(&Value::Int(*value), at) {
                forwarded += sum;
            }
        }

        // Flush the residual window by feeding a zero far in the future.
        let flush_at = start + Duration::from_secs(10_000);
        if let Some(Value::Float(sum)) = aggregate.feed(&Value::Int(0), flush_at) {
            forwarded += sum;
        }

        // PROPERTY: everything fed comes back out exactly once.
        prop_assert!(
            (fed - forwarded).abs() < 1e-6,
            "fed {fed}, forwarded {forwarded}"
        );
    });
}

#[test]
fn prop_custom_is_a_pure_predicate() {
    proptest!(|(inputs in prop::collection::vec(-50i64..50, 0..64))| {
        let mut filter = filters::custom(|value| {
            value.as_i64().is_some_and(|v| v % 2 == 0)
        });
        let now = Instant::now();

        for input in inputs {
            let forwarded = filter.feed(&Value::Int(input), now);
            if input % 2 == 0 {
                prop_assert_eq!(forwarded, Some(Value::Int(input)));
            } else {
                prop_assert_eq!(forwarded, None);
            }
        }
    });
}
