//! Property-based tests for polarity mapping and debouncing.
//!
//! These tests use proptest to generate random configurations and edge
//! timelines and verify that the filtering and mapping rules hold for all of
//! them.

use std::time::Duration;

use proptest::prelude::*;
use pushline_core::{ActiveMode, Bias, EdgeDirection, EdgeEvent, EdgeTimestamp, PolarityConfig, RawLevel};
use pushline_hardware::DebounceFilter;

/// Strategy for generating active modes.
fn active_mode() -> impl Strategy<Value = ActiveMode> {
    prop_oneof![Just(ActiveMode::ActiveHigh), Just(ActiveMode::ActiveLow)]
}

/// Strategy for generating bias settings.
fn bias() -> impl Strategy<Value = Bias> {
    prop_oneof![Just(Bias::Off), Just(Bias::PullDown), Just(Bias::PullUp)]
}

/// Strategy for generating edge directions.
fn direction() -> impl Strategy<Value = EdgeDirection> {
    prop_oneof![Just(EdgeDirection::Rising), Just(EdgeDirection::Falling)]
}

fn event_at(direction: EdgeDirection, micros: i64) -> EdgeEvent {
    EdgeEvent::new(direction, EdgeTimestamp::from_micros(micros))
}

proptest! {
    /// Property: the logical state is the raw bit, inverted for active-low.
    #[test]
    fn prop_logical_state_law(mode in active_mode(), bias in bias(), bit in 0u8..=1) {
        let polarity = PolarityConfig::new(mode, bias);
        let raw = RawLevel::from_bit(bit);
        let expected = (bit == 1) != (mode == ActiveMode::ActiveLow);
        prop_assert_eq!(polarity.logical(raw), expected);
    }

    /// Property: an edge one microsecond short of the window is rejected and
    /// one exactly at the window is accepted.
    #[test]
    fn prop_debounce_window_boundary(
        start in 0i64..1_000_000_000,
        window in 1u32..1_000_000,
        first in direction(),
        second in direction(),
    ) {
        let window_us = i64::from(window);

        let mut filter = DebounceFilter::new(Duration::from_micros(u64::from(window)));
        prop_assert!(filter.accept(&event_at(first, start)));
        prop_assert!(!filter.accept(&event_at(second, start + window_us - 1)));
        prop_assert!(filter.accept(&event_at(second, start + window_us)));
    }

    /// Property: accepted edges are always at least one window apart.
    #[test]
    fn prop_accepted_edges_are_spaced(
        window in 0u32..50_000,
        gaps in prop::collection::vec(0i64..20_000, 1..64),
    ) {
        let mut filter = DebounceFilter::from_micros(window);
        let mut now = 0i64;
        let mut accepted = Vec::new();

        for (i, gap) in gaps.iter().enumerate() {
            now += gap;
            let direction = if i % 2 == 0 { EdgeDirection::Falling } else { EdgeDirection::Rising };
            if filter.accept(&event_at(direction, now)) {
                accepted.push(now);
            }
        }

        prop_assert!(!accepted.is_empty());
        for pair in accepted.windows(2) {
            prop_assert!(pair[1] - pair[0] >= i64::from(window));
        }
    }

    /// Property: a zero window accepts every edge.
    #[test]
    fn prop_zero_window_accepts_all(times in prop::collection::vec(0i64..1_000_000, 1..32)) {
        let mut filter = DebounceFilter::disabled();
        for (i, micros) in times.iter().enumerate() {
            let direction = if i % 2 == 0 { EdgeDirection::Rising } else { EdgeDirection::Falling };
            prop_assert!(filter.accept(&event_at(direction, *micros)));
        }
    }
}
