// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contract for the opaque composition engine.
//!
//! The engine owns the display hardware: it validates a prepared
//! [`LayerStack`], assigns a [`Composition`](crate::layer::Composition) to
//! every layer, programs the pipes on commit and produces the release and
//! retire fences. The core only produces and consumes the documented
//! structures; how pixels get blended or scanned out is entirely the engine's
//! business.
//!
//! # Call order
//!
//! For every displayed frame the core calls [`prepare`](DisplayEngine::prepare)
//! and then [`commit`](DisplayEngine::commit) with the same stack, exactly
//! once each. Whenever a frame is abandoned it calls
//! [`flush`](DisplayEngine::flush) instead of `commit` so that buffers held
//! from the previous frame are released:
//!
//! ```rust,ignore
//! fn on_refresh(display: &mut Display<MyEngine>, content: &mut ContentList) {
//!     let mut tracer = Tracer::none();
//!
//!     // Build the stack and let the engine assign compositions.
//!     display.prepare(content, &mut tracer)?;
//!
//!     // The window system GPU-composites what it was told to, then:
//!     display.commit(content, &mut tracer)?;
//!
//!     // Hand release/retire fences back to the window system.
//!     display.post_commit(content, &mut tracer);
//! }
//! ```

use crate::format::LayerBufferFormat;
use crate::layer::LayerStack;

/// Errors reported by the composition engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum EngineError {
    /// The display is being torn down; no further frames will be accepted.
    #[error("display is shutting down")]
    ShutDown,
    /// A transient permission conflict (e.g. a secure session transition).
    #[error("permission denied")]
    Permission,
    /// The request carried parameters the engine cannot honour.
    #[error("invalid parameters")]
    Parameters,
    /// The engine ran out of hardware or memory resources for this frame.
    #[error("out of resources")]
    Resources,
    /// The request is not supported on this display.
    #[error("not supported")]
    NotSupported,
    /// Any other failure.
    #[error("undefined engine failure")]
    Undefined,
}

/// Power state requested for a display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PowerMode {
    /// Panel and pipes are off.
    Off,
    /// Normal operation.
    #[default]
    On,
    /// Low-power always-on mode; frames are still accepted.
    Doze,
    /// Low-power mode with updates suspended.
    DozeSuspend,
}

/// Static properties of the display the engine drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DisplayAttributes {
    /// Active width in pixels.
    pub width: u32,
    /// Active height in pixels.
    pub height: u32,
    /// Vsync period in nanoseconds.
    pub vsync_period_ns: u32,
    /// Lowest refresh rate the panel can be switched to.
    pub min_refresh_rate: u32,
    /// Highest refresh rate the panel can be switched to.
    pub max_refresh_rate: u32,
    /// Width of the layer mixer, used as the frame of reference for scan
    /// adjustment.
    pub mixer_width: u32,
    /// Height of the layer mixer.
    pub mixer_height: u32,
    /// Whether the sink applies underscan itself.
    pub underscan_supported: bool,
}

impl DisplayAttributes {
    /// Attributes of a fixed-rate panel with mixer and active area equal.
    #[must_use]
    pub const fn fixed(width: u32, height: u32, refresh_rate: u32) -> Self {
        Self {
            width,
            height,
            vsync_period_ns: if refresh_rate == 0 {
                0
            } else {
                1_000_000_000 / refresh_rate
            },
            min_refresh_rate: refresh_rate,
            max_refresh_rate: refresh_rate,
            mixer_width: width,
            mixer_height: height,
            underscan_supported: false,
        }
    }
}

/// Output geometry pushed to an off-screen display when its output buffer
/// changes shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OutputConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output pixel format.
    pub format: LayerBufferFormat,
}

/// The opaque hardware composition engine behind one display.
///
/// Implementations are expected to be cheap to call: every method runs on
/// the window system's refresh path.
pub trait DisplayEngine {
    /// Returns the display's static attributes.
    fn attributes(&self) -> DisplayAttributes;

    /// Validates the stack and assigns a composition to every layer.
    fn prepare(&mut self, stack: &mut LayerStack) -> Result<(), EngineError>;

    /// Programs the hardware with the prepared stack.
    ///
    /// The engine may duplicate acquire fences it needs; the core closes its
    /// own copies once this returns. On success the engine sets a release
    /// fence on every layer it composed and, optionally, the stack's retire
    /// fence.
    fn commit(&mut self, stack: &mut LayerStack) -> Result<(), EngineError>;

    /// Abandons the current frame, releasing buffers held from the previous
    /// one.
    fn flush(&mut self) -> Result<(), EngineError>;

    /// Switches the display's power state.
    fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), EngineError>;

    /// Switches the panel refresh rate.
    fn set_refresh_rate(&mut self, refresh_rate: u32) -> Result<(), EngineError>;

    /// Reconfigures the output geometry of an off-screen display.
    fn set_output_config(&mut self, config: &OutputConfig) -> Result<(), EngineError> {
        _ = config;
        Err(EngineError::NotSupported)
    }

    /// Selects one of the display's configurations by index.
    fn set_active_config(&mut self, index: u32) -> Result<(), EngineError> {
        _ = index;
        Err(EngineError::NotSupported)
    }

    /// Sets the inactivity period after which the engine reports idle.
    fn set_idle_timeout(&mut self, timeout_ms: u32) -> Result<(), EngineError> {
        _ = timeout_ms;
        Ok(())
    }

    /// Caps the number of hardware blend stages the engine may use.
    fn set_max_mixer_stages(&mut self, stages: u32) -> Result<(), EngineError> {
        _ = stages;
        Err(EngineError::NotSupported)
    }
}
