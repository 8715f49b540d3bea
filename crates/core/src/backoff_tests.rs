// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn zero_jitter_gives_zero_delay() {
    let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
    assert_eq!(b.next_delay_with_jitter(0, 0.0), Duration::ZERO);
}

#[test]
fn full_jitter_matches_uncapped_exponential() {
    let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
    assert_eq!(b.next_delay_with_jitter(0, 1.0), Duration::from_millis(100));
    assert_eq!(b.next_delay_with_jitter(1, 1.0), Duration::from_millis(200));
    assert_eq!(b.next_delay_with_jitter(2, 1.0), Duration::from_millis(400));
}

#[test]
fn delay_never_exceeds_max() {
    let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(1));
    let delay = b.next_delay_with_jitter(20, 1.0);
    assert!(delay <= Duration::from_secs(1));
}

#[test]
fn jitter_is_clamped_to_unit_interval() {
    let b = Backoff::new(Duration::from_millis(100), Duration::from_secs(10));
    assert_eq!(b.next_delay_with_jitter(0, 2.0), b.next_delay_with_jitter(0, 1.0));
    assert_eq!(b.next_delay_with_jitter(0, -1.0), Duration::ZERO);
}
