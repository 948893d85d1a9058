//! Integration tests for edge dispatch through a button.
//!
//! Each test runs a button on the simulated chip and drives it through the
//! control handle, the way a physical switch would drive a real line.

mod common;

use std::sync::{Arc, Weak, mpsc};
use std::thread;
use std::time::Duration;

use common::{CHIP, Recorder, legacy_button, wait_until};
use parking_lot::Mutex;
use pushline_core::constants::{PUD_DOWN, PUD_UP};
use pushline_core::{ActiveMode, Bias, EdgeDirection, EdgeSelector, PolarityConfig, RawLevel};
use pushline_hardware::mock::SimulatedDriver;
use pushline_hardware::{Button, InterruptConfig};

#[test]
fn test_bounce_inside_window_is_dropped() {
    let (button, control) = legacy_button(17, PUD_UP);
    let recorder = Recorder::new();

    button
        .begin_interrupt(InterruptConfig::legacy(true, 5_000).with_sink(recorder.sink()))
        .unwrap();

    control.push_edge_at_micros(EdgeDirection::Falling, 0);
    control.push_edge_at_micros(EdgeDirection::Rising, 2_000);
    control.push_edge_at_micros(EdgeDirection::Rising, 8_000);

    assert!(recorder.wait_for(2));
    assert!(control.wait_drained(common::WAIT_TIMEOUT));
    button.stop_interrupt();

    assert_eq!(recorder.events(), vec![(false, 0, 0), (true, 0, 8_000_000)]);
}

#[test]
fn test_cache_follows_accepted_edges() {
    let (button, control) = legacy_button(17, PUD_UP);
    let recorder = Recorder::new();

    button
        .begin_interrupt(InterruptConfig::legacy(true, 0).with_sink(recorder.sink()))
        .unwrap();

    // Active low: falling edge presses
    control.push_edge_at_micros(EdgeDirection::Falling, 100);
    assert!(recorder.wait_for(1));
    assert!(button.state().unwrap());
    assert!(button.cached_state().unwrap());

    control.push_edge_at_micros(EdgeDirection::Rising, 200);
    assert!(recorder.wait_for(2));
    assert!(!button.state().unwrap());

    button.stop_interrupt();
}

#[test]
fn test_rising_only_selection() {
    let (button, control) = legacy_button(3, PUD_DOWN);
    let recorder = Recorder::new();

    let config = InterruptConfig::legacy(false, 0).with_sink(recorder.sink());
    assert_eq!(config.edges(), EdgeSelector::Rising);
    button.begin_interrupt(config).unwrap();

    control.push_edge_at_micros(EdgeDirection::Falling, 10);
    control.push_edge_at_micros(EdgeDirection::Rising, 20);

    assert!(recorder.wait_for(1));
    assert!(control.wait_drained(common::WAIT_TIMEOUT));
    button.stop_interrupt();

    assert_eq!(recorder.events(), vec![(true, 0, 20_000)]);
}

#[test]
fn test_out_of_range_offset_fails_without_line() {
    let (button, control) = legacy_button(31, PUD_UP);

    let error = button.begin().unwrap_err();
    assert!(error.is_configuration());
    assert_eq!(control.open_count(), 0);
    assert!(!button.is_open());

    assert!(button.value().is_err());
    assert!(button.last_error().is_some());
}

#[test]
fn test_no_sink_call_after_stop() {
    let (button, control) = legacy_button(8, PUD_UP);
    let recorder = Recorder::new();

    button
        .begin_interrupt(InterruptConfig::new().with_sink(recorder.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Falling, 1);
    assert!(recorder.wait_for(1));

    button.stop_interrupt();
    assert!(!button.is_dispatching());

    control.push_edge_at_micros(EdgeDirection::Rising, 2);
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.count(), 1);

    // Polling works again once dispatch has stopped
    assert_eq!(button.value().unwrap(), RawLevel::High);
}

#[test]
fn test_concurrent_stop_calls() {
    let (button, control) = legacy_button(9, PUD_UP);
    let button = Arc::new(button);
    let recorder = Recorder::new();

    button
        .begin_interrupt(InterruptConfig::new().with_sink(recorder.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Falling, 1);
    assert!(recorder.wait_for(1));

    let stoppers: Vec<_> = (0..4)
        .map(|i| {
            let button = Arc::clone(&button);
            thread::spawn(move || {
                if i % 2 == 0 {
                    button.stop_interrupt();
                } else {
                    button.clean();
                }
            })
        })
        .collect();
    for stopper in stoppers {
        stopper.join().unwrap();
    }

    assert!(!button.is_dispatching());
    button.clean();
    assert!(!control.is_requested());
    assert_eq!(recorder.count(), 1);
}

#[test]
fn test_restart_after_stop() {
    let (button, control) = legacy_button(10, PUD_UP);
    let first = Recorder::new();
    let second = Recorder::new();

    button
        .begin_interrupt(InterruptConfig::new().with_sink(first.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Falling, 1);
    assert!(first.wait_for(1));
    button.stop_interrupt();

    button
        .begin_interrupt(InterruptConfig::new().with_sink(second.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Rising, 2);
    assert!(second.wait_for(1));
    button.clean();

    assert_eq!(first.count(), 1);
    assert_eq!(second.events(), vec![(true, 0, 2_000)]);
    assert_eq!(control.open_count(), 1);
}

#[test]
fn test_sink_reads_its_own_button() {
    let (driver, control) = SimulatedDriver::new(CHIP);
    let polarity = PolarityConfig::new(ActiveMode::ActiveHigh, Bias::PullDown);
    let button = Arc::new(Button::new(driver, CHIP, 4, polarity));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let weak: Weak<Button<SimulatedDriver>> = Arc::downgrade(&button);
    let record = Arc::clone(&seen);
    let sink = move |_rising: bool, _sec: i64, _nsec: i64| {
        if let Some(button) = weak.upgrade() {
            record.lock().push(button.state().ok());
        }
    };

    button
        .begin_interrupt(InterruptConfig::new().with_sink(sink))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Rising, 5);
    control.push_edge_at_micros(EdgeDirection::Falling, 6);

    assert!(wait_until(|| seen.lock().len() == 2));
    button.clean();

    assert_eq!(*seen.lock(), vec![Some(true), Some(false)]);
}

#[test]
fn test_clean_from_sink_then_restart() {
    let (button, control) = legacy_button(9, PUD_UP);
    let button = Arc::new(button);
    let weak = Arc::downgrade(&button);

    let sink = move |_rising: bool, _sec: i64, _nsec: i64| {
        if let Some(button) = weak.upgrade() {
            button.clean();
        }
    };
    button
        .begin_interrupt(InterruptConfig::new().with_sink(sink))
        .unwrap();

    control.push_edge_at_micros(EdgeDirection::Falling, 10);
    assert!(wait_until(|| !control.is_requested()));
    assert!(!button.is_open());
    assert!(button.state().is_err());

    let recorder = Recorder::new();
    button
        .begin_interrupt(InterruptConfig::new().with_sink(recorder.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Rising, 20);
    assert!(recorder.wait_for(1));

    button.clean();
    assert_eq!(recorder.events(), vec![(true, 0, 20_000)]);
    assert_eq!(control.open_count(), 2);
}

#[test]
fn test_stop_while_sink_restarts_dispatch() {
    let (button, control) = legacy_button(9, PUD_DOWN);
    let button = Arc::new(button);
    let weak = Arc::downgrade(&button);
    let (entered_tx, entered_rx) = mpsc::channel();
    let (restart_tx, restart_rx) = mpsc::channel();

    let sink = move |_rising: bool, _sec: i64, _nsec: i64| {
        let _ = entered_tx.send(());
        thread::sleep(Duration::from_millis(100));
        if let Some(button) = weak.upgrade() {
            let config = InterruptConfig::new().with_sink(|_: bool, _: i64, _: i64| {});
            let _ = restart_tx.send(button.begin_interrupt(config));
        }
    };
    button
        .begin_interrupt(InterruptConfig::new().with_sink(sink))
        .unwrap();

    control.push_edge_at_micros(EdgeDirection::Rising, 1);
    entered_rx.recv_timeout(common::WAIT_TIMEOUT).unwrap();

    let (stopped_tx, stopped_rx) = mpsc::channel();
    let stopper = Arc::clone(&button);
    thread::spawn(move || {
        stopper.stop_interrupt();
        let _ = stopped_tx.send(());
    });

    let restart = restart_rx.recv_timeout(common::WAIT_TIMEOUT).unwrap();
    assert!(restart.unwrap_err().is_configuration());
    stopped_rx.recv_timeout(common::WAIT_TIMEOUT).unwrap();

    assert!(!button.is_dispatching());
    assert!(button.is_open());
    assert_eq!(button.value().unwrap(), RawLevel::Low);
}

#[test]
fn test_panicking_sink_stops_dispatch() {
    let (button, control) = legacy_button(9, PUD_UP);
    let sink = |rising: bool, _sec: i64, _nsec: i64| {
        assert!(rising, "unexpected falling edge");
    };
    button
        .begin_interrupt(InterruptConfig::new().with_sink(sink))
        .unwrap();

    control.push_edge_at_micros(EdgeDirection::Falling, 1);
    assert!(wait_until(|| !button.is_dispatching()));
    assert!(button.last_error().unwrap().contains("event sink panicked"));

    // Active-low: the falling edge was cached as pressed before the sink ran.
    assert!(button.cached_state().unwrap());

    let recorder = Recorder::new();
    button
        .begin_interrupt(InterruptConfig::new().with_sink(recorder.sink()))
        .unwrap();
    control.push_edge_at_micros(EdgeDirection::Rising, 2);
    assert!(recorder.wait_for(1));
    button.stop_interrupt();

    assert_eq!(recorder.events(), vec![(true, 0, 2_000)]);
    assert_eq!(control.open_count(), 1);
}

#[test]
fn test_line_error_returns_button_to_polling() {
    let (button, control) = legacy_button(9, PUD_UP);
    let recorder = Recorder::new();
    button
        .begin_interrupt(InterruptConfig::new().with_sink(recorder.sink()))
        .unwrap();

    control.fail_next_wait("line vanished");
    assert!(wait_until(|| !button.is_dispatching()));

    control.set_level(RawLevel::Low);
    assert!(button.state().unwrap());
    assert_eq!(button.value().unwrap(), RawLevel::Low);
    assert!(button.last_error().unwrap().contains("line vanished"));

    button.clean();
    assert!(!control.is_requested());
    assert_eq!(recorder.count(), 0);
}
