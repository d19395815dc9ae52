// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn fake_clock_advances_both_instant_and_epoch() {
    let clock = FakeClock::new();
    let before = clock.now();
    let before_epoch = clock.epoch_ms();
    clock.advance(Duration::from_secs(5));
    assert_eq!(clock.now(), before + Duration::from_secs(5));
    assert_eq!(clock.epoch_ms(), before_epoch + 5000);
}

#[test]
fn epoch_seconds_derives_from_epoch_ms() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(2_500);
    assert_eq!(clock.epoch_seconds(), 2.5);
}
