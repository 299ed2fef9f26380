// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic host time used to stamp pipeline phases.
//!
//! The core never reads a clock itself. Platform crates read their monotonic
//! clock, wrap the value in a [`HostTime`] and hand it to the trace events
//! they emit around each phase; [`Timebase`] converts the ticks back to
//! nanoseconds when exporting.

use core::fmt;

/// A point in time expressed as platform-native monotonic ticks.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw tick value.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Returns the number of ticks elapsed since `earlier`, or zero if
    /// `earlier` is after `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_ticks_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({})", self.0)
    }
}

/// Rational conversion factor from ticks to nanoseconds.
///
/// `nanoseconds = ticks * numer / denom`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timebase {
    /// Numerator of the ticks-to-nanoseconds ratio.
    pub numer: u32,
    /// Denominator of the ticks-to-nanoseconds ratio.
    pub denom: u32,
}

impl Timebase {
    /// A timebase where ticks are already nanoseconds.
    pub const NANOS: Self = Self { numer: 1, denom: 1 };

    /// Converts a tick count to nanoseconds.
    ///
    /// A zero denominator is treated as the identity timebase.
    #[inline]
    #[must_use]
    pub fn ticks_to_nanos(self, ticks: u64) -> u64 {
        if self.denom == 0 {
            return ticks;
        }
        let wide = u128::from(ticks) * u128::from(self.numer) / u128::from(self.denom);
        u64::try_from(wide).unwrap_or(u64::MAX)
    }

    /// Converts a tick count to fractional microseconds.
    #[inline]
    #[must_use]
    pub fn ticks_to_micros(self, ticks: u64) -> f64 {
        self.ticks_to_nanos(ticks) as f64 / 1000.0
    }
}

impl fmt::Debug for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timebase({}/{})", self.numer, self.denom)
    }
}
