// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session clock used to stamp pipeline phases and vsync callbacks.

use hwc_core::time::{HostTime, Timebase};
use rustix::time::{ClockId, Timespec, clock_gettime};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Host ticks are nanoseconds of `CLOCK_MONOTONIC`.
#[must_use]
pub const fn timebase() -> Timebase {
    Timebase::NANOS
}

/// Current monotonic time.
#[must_use]
pub fn now() -> HostTime {
    from_timespec(clock_gettime(ClockId::Monotonic))
}

fn from_timespec(ts: Timespec) -> HostTime {
    let secs = u64::try_from(ts.tv_sec).unwrap_or(0);
    let nanos = u64::try_from(ts.tv_nsec).unwrap_or(0).min(999_999_999);
    let ticks = u128::from(secs)
        .saturating_mul(NANOS_PER_SECOND)
        .saturating_add(u128::from(nanos));
    HostTime(u64::try_from(ticks).unwrap_or(u64::MAX))
}

/// Converts a millisecond timeout into a poll timeout.
pub(crate) fn timeout_from_millis(ms: u32) -> Timespec {
    Timespec {
        tv_sec: i64::from(ms / 1000),
        tv_nsec: i64::from(ms % 1000) * 1_000_000,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_does_not_go_backwards() {
        let first = now();
        let second = now();
        assert!(second >= first, "monotonic clock went backwards");
        assert_eq!(timebase(), Timebase::NANOS);
    }

    #[test]
    fn negative_and_huge_timespecs_saturate() {
        let negative = Timespec {
            tv_sec: -5,
            tv_nsec: 10,
        };
        assert_eq!(from_timespec(negative), HostTime(10));
        let huge = Timespec {
            tv_sec: i64::MAX,
            tv_nsec: 999_999_999,
        };
        assert_eq!(from_timespec(huge), HostTime(u64::MAX));
    }

    #[test]
    fn millisecond_timeouts_split_into_seconds() {
        let ts = timeout_from_millis(2_250);
        assert_eq!((ts.tv_sec, ts.tv_nsec), (2, 250_000_000));
    }
}
