// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame refresh-rate selection.
//!
//! Panels that support several refresh rates are switched to the lowest rate
//! that still shows the content correctly. The selector combines three inputs
//! in strict precedence:
//!
//! 1. a forced rate set through
//!    [`DisplayCommand::SetForcedRefreshRate`](crate::display::DisplayCommand),
//! 2. the minimum rate once the engine reported an idle timeout,
//! 3. the rate a single updating video layer asked for in its metadata,
//!
//! falling back to the maximum rate.

use crate::error::DisplayError;

/// Chooses the refresh rate for each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshRateSelector {
    min: u32,
    max: u32,
    active: u32,
    forced: Option<u32>,
    idle: bool,
    use_metadata: bool,
}

impl RefreshRateSelector {
    /// Creates a selector for a panel supporting `min..=max`, currently
    /// running at `max`.
    ///
    /// A reversed range is treated as a fixed-rate panel at `max`.
    #[must_use]
    pub const fn new(min: u32, max: u32, use_metadata: bool) -> Self {
        let min = if min > max { max } else { min };
        Self {
            min,
            max,
            active: max,
            forced: None,
            idle: false,
            use_metadata,
        }
    }

    /// Lowest supported rate.
    #[must_use]
    pub const fn min(&self) -> u32 {
        self.min
    }

    /// Highest supported rate.
    #[must_use]
    pub const fn max(&self) -> u32 {
        self.max
    }

    /// Rate the panel is running at.
    #[must_use]
    pub const fn active(&self) -> u32 {
        self.active
    }

    /// Records that the panel switched to `rate`.
    pub fn set_active(&mut self, rate: u32) {
        self.active = rate;
    }

    /// Whether the content's metadata rate is considered.
    #[must_use]
    pub const fn uses_metadata(&self) -> bool {
        self.use_metadata
    }

    /// Enables or disables the metadata rate.
    pub fn set_use_metadata(&mut self, enabled: bool) {
        self.use_metadata = enabled;
    }

    /// Forces a rate, or clears the override with `0`.
    pub fn set_forced(&mut self, rate: u32) -> Result<(), DisplayError> {
        if rate == 0 {
            self.forced = None;
            return Ok(());
        }
        if rate < self.min || rate > self.max {
            return Err(DisplayError::InvalidParameters(
                "forced refresh rate outside the panel range",
            ));
        }
        self.forced = Some(rate);
        Ok(())
    }

    /// The forced rate, if any.
    #[must_use]
    pub const fn forced(&self) -> Option<u32> {
        self.forced
    }

    /// Latches an idle timeout for the next selection.
    pub fn on_idle(&mut self) {
        self.idle = true;
    }

    /// Brings a requested rate into the supported range.
    ///
    /// Rates below the minimum are raised to their smallest multiple that
    /// reaches it, so 24 fps content on a 48–60 Hz panel runs at 48 Hz with
    /// every frame shown twice. A zero rate means "no preference" and yields
    /// the maximum.
    #[must_use]
    pub const fn sanitize(&self, rate: u32) -> u32 {
        if rate == 0 {
            return self.max;
        }
        let rate = if rate < self.min {
            self.min.div_ceil(rate).saturating_mul(rate)
        } else {
            rate
        };
        if rate > self.max { self.max } else { rate }
    }

    /// Picks the rate for this frame and consumes the idle latch.
    ///
    /// `metadata_rate` is the highest sanitized rate any layer asked for;
    /// it is only honoured when exactly one layer is updating.
    pub fn select(&mut self, one_layer_updating: bool, metadata_rate: Option<u32>) -> u32 {
        let idle = core::mem::take(&mut self.idle);
        if let Some(forced) = self.forced {
            return forced;
        }
        if idle {
            return self.min;
        }
        match metadata_rate {
            Some(rate) if self.use_metadata && one_layer_updating => self.sanitize(rate),
            _ => self.max,
        }
    }

    /// Like [`select`](Self::select), but only returns a rate when it differs
    /// from the active one.
    pub fn next_change(
        &mut self,
        one_layer_updating: bool,
        metadata_rate: Option<u32>,
    ) -> Option<u32> {
        let rate = self.select(one_layer_updating, metadata_rate);
        (rate != self.active).then_some(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::XorShift;

    #[test]
    fn sanitize_raises_to_multiple_and_clamps() {
        let sel = RefreshRateSelector::new(48, 60, true);
        assert_eq!(sel.sanitize(24), 48, "24 doubled");
        assert_eq!(sel.sanitize(30), 60, "30 doubled");
        assert_eq!(sel.sanitize(25), 50, "25 doubled");
        assert_eq!(sel.sanitize(50), 50);
        assert_eq!(sel.sanitize(90), 60, "clamped to max");
        assert_eq!(sel.sanitize(0), 60, "no preference");
    }

    #[test]
    fn sanitize_is_idempotent_and_in_range() {
        let mut rng = XorShift::new(0x5eed);
        for _ in 0..2_000 {
            let min = 1 + rng.below(120);
            let max = min + rng.below(120);
            let sel = RefreshRateSelector::new(min, max, true);
            let r = rng.below(400);
            let once = sel.sanitize(r);
            assert!(
                (min..=max).contains(&once),
                "sanitize({r}) = {once} outside [{min}, {max}]"
            );
            assert_eq!(sel.sanitize(once), once, "sanitize is idempotent");
        }
    }

    #[test]
    fn metadata_rate_needs_one_updating_layer() {
        let mut sel = RefreshRateSelector::new(48, 60, true);
        assert_eq!(sel.select(true, Some(24)), 48, "24 fps video → 48 Hz");
        assert_eq!(sel.select(false, Some(24)), 60, "several layers updating");
        assert_eq!(sel.select(true, None), 60, "no metadata");

        sel.set_use_metadata(false);
        assert_eq!(sel.select(true, Some(24)), 60, "feature off");
    }

    #[test]
    fn precedence_forced_then_idle() {
        let mut sel = RefreshRateSelector::new(48, 60, true);
        sel.on_idle();
        assert_eq!(sel.select(true, Some(60)), 48, "idle wins over metadata");
        assert_eq!(sel.select(false, None), 60, "idle latch is consumed");

        sel.set_forced(50).expect("in range");
        sel.on_idle();
        assert_eq!(sel.select(true, Some(24)), 50, "forced wins over idle");
        assert_eq!(
            sel.set_forced(61),
            Err(DisplayError::InvalidParameters(
                "forced refresh rate outside the panel range"
            ))
        );
        sel.set_forced(0).expect("clear");
        assert_eq!(sel.forced(), None);
    }

    #[test]
    fn change_requested_only_when_rate_differs() {
        let mut sel = RefreshRateSelector::new(48, 60, true);
        assert_eq!(sel.next_change(false, None), None, "already at max");
        assert_eq!(sel.next_change(true, Some(24)), Some(48));
        sel.set_active(48);
        assert_eq!(sel.next_change(true, Some(24)), None);
        assert_eq!(sel.next_change(false, None), Some(60));
    }
}
