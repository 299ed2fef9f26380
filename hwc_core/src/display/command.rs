// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runtime commands accepted by a display.

use crate::geometry::ActionSafe;

/// Pause state requested by the window system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayStatus {
    /// Stop showing new frames; every frame is flushed and the window system
    /// is told not to composite.
    Pause,
    /// Resume and redraw everything on the next frame.
    Resume,
    /// Redraw everything on the next frame.
    Refresh,
}

/// A runtime adjustment dispatched through
/// [`Display::perform`](super::Display::perform).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayCommand {
    /// Pins the refresh rate, or releases the pin with `0`.
    SetForcedRefreshRate(u32),
    /// Sets the engine's idle timeout in milliseconds.
    SetIdleTimeout(u32),
    /// Allows or forbids metadata-driven refresh rates.
    SetMetadataRefreshRate(bool),
    /// Enables or disables swap-interval-zero fence handling.
    SetSwapIntervalZero(bool),
    /// Pauses, resumes or refreshes the display.
    SetDisplayStatus(DisplayStatus),
    /// Switches to another of the engine's display configurations.
    SetActiveConfig(u32),
    /// Dumps the next `frames` frames. With `output`, the primary display
    /// renders them into a dedicated output buffer.
    SetFrameDumpConfig {
        /// Number of frames to dump.
        frames: u32,
        /// Whether to render into an output buffer.
        output: bool,
    },
    /// Sets or clears the action-safe area of an external display.
    SetActionSafe(Option<ActionSafe>),
    /// Caps the number of hardware blend stages.
    SetMaxMixerStages(u32),
}
