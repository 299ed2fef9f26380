// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-display configuration.
//!
//! [`DisplayConfig`] fixes everything a display needs at construction time.
//! Settings that change at runtime arrive through
//! [`DisplayCommand`](crate::display::DisplayCommand) instead.

use crate::display::DisplayKind;
use crate::geometry::ActionSafe;

/// Configuration for a [`Display`](crate::display::Display).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Which kind of display this is.
    pub kind: DisplayKind,
    /// Layer slots in the composition cache. Frames with more layers are
    /// never cached.
    pub max_layer_count: usize,
    /// Granularity the layer-stack arena grows in.
    pub arena_step_bytes: usize,
    /// Blit rectangles reserved per layer for the blit engine.
    pub blit_target_layers: usize,
    /// Whether a single updating layer's metadata frame rate may lower the
    /// panel refresh rate.
    pub use_metadata_refresh_rate: bool,
    /// Close every fence as soon as it is seen.
    pub swap_interval_zero: bool,
    /// Scan adjustment for overscanning external sinks.
    pub action_safe: Option<ActionSafe>,
    /// Inactivity period after which the engine reports idle, in
    /// milliseconds. Zero disables idle detection.
    pub idle_timeout_ms: u32,
}

impl DisplayConfig {
    /// Default configuration for the built-in panel.
    #[must_use]
    pub const fn primary() -> Self {
        Self {
            kind: DisplayKind::Primary,
            max_layer_count: 32,
            arena_step_bytes: 4096,
            blit_target_layers: 0,
            use_metadata_refresh_rate: true,
            swap_interval_zero: false,
            action_safe: None,
            idle_timeout_ms: 70,
        }
    }

    /// Default configuration for a hot-plugged external display.
    #[must_use]
    pub const fn external() -> Self {
        Self {
            kind: DisplayKind::External,
            use_metadata_refresh_rate: false,
            idle_timeout_ms: 0,
            ..Self::primary()
        }
    }

    /// Default configuration for an off-screen display.
    #[must_use]
    pub const fn virtual_display() -> Self {
        Self {
            kind: DisplayKind::Virtual,
            use_metadata_refresh_rate: false,
            idle_timeout_ms: 0,
            ..Self::primary()
        }
    }
}
