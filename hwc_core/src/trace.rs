// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for the display pipeline.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! display state machine calls at each stage. All method bodies default to
//! no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! The core has no clock. [`PhaseBeginEvent`] and [`PhaseEndEvent`] are
//! emitted by whoever drives the display and can read one.
//!
//! # Crate features
//!
//! - `trace`: enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`): gates [`CompositionRecord`] events plus
//!   the corresponding `TraceSink` method.

use crate::engine::{EngineError, OutputConfig};
use crate::output::DisplayId;
use crate::time::HostTime;

#[cfg(feature = "trace-rich")]
use crate::layer::Composition;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which phase of the display pipeline is being measured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PhaseKind {
    /// Stack construction and composition assignment.
    Prepare,
    /// Programming the hardware.
    Commit,
    /// Handing fences back to the window system.
    PostCommit,
}

impl PhaseKind {
    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Prepare => "prepare",
            Self::Commit => "commit",
            Self::PostCommit => "post_commit",
        }
    }
}

/// Why a frame was flushed instead of committed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlushReason {
    /// Only the GPU target was present.
    SingleLayer,
    /// The display is paused.
    Paused,
    /// The display is powered off.
    PowerOff,
    /// An off-screen display had no output buffer.
    NoOutput,
    /// Building the stack failed.
    FrameError,
    /// The engine rejected the frame.
    EngineError,
}

/// Which engine call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineOp {
    /// [`DisplayEngine::prepare`](crate::engine::DisplayEngine::prepare).
    Prepare,
    /// [`DisplayEngine::commit`](crate::engine::DisplayEngine::commit).
    Commit,
    /// [`DisplayEngine::flush`](crate::engine::DisplayEngine::flush).
    Flush,
    /// [`DisplayEngine::set_refresh_rate`](crate::engine::DisplayEngine::set_refresh_rate).
    SetRefreshRate,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted at the end of prepare.
#[derive(Clone, Copy, Debug)]
pub struct FramePreparedEvent {
    /// Display the frame targets.
    pub display: DisplayId,
    /// Monotonic frame counter of the display.
    pub frame_index: u64,
    /// Layers in the content list, including the GPU target.
    pub layer_count: usize,
    /// Whether the frame will be flushed instead of committed.
    pub flush: bool,
    /// Whether the GPU target must be redrawn.
    pub needs_refresh: bool,
    /// Whether exactly one source layer is updating.
    pub one_layer_updating: bool,
    /// Highest frame rate any layer asked for.
    pub metadata_refresh_rate: Option<u32>,
}

/// Marks the beginning of a pipeline phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseBeginEvent {
    /// Display being driven.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is starting.
    pub phase: PhaseKind,
    /// Host time at the start of the phase.
    pub timestamp: HostTime,
}

/// Marks the end of a pipeline phase.
#[derive(Clone, Copy, Debug)]
pub struct PhaseEndEvent {
    /// Display being driven.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Which phase is ending.
    pub phase: PhaseKind,
    /// Host time at the end of the phase.
    pub timestamp: HostTime,
}

/// Emitted after post-commit handed fences back.
#[derive(Clone, Copy, Debug)]
pub struct FrameCommittedEvent {
    /// Display the frame targets.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Release fences handed back to the window system.
    pub released_fences: usize,
    /// Release fences closed by the core.
    pub closed_fences: usize,
    /// Whether a retire fence was handed back.
    pub retire_fence: bool,
}

/// Emitted when a frame is flushed.
#[derive(Clone, Copy, Debug)]
pub struct FrameFlushedEvent {
    /// Display the frame targets.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Why the frame was flushed.
    pub reason: FlushReason,
}

/// Emitted when an engine call fails and the failure is absorbed.
#[derive(Clone, Copy, Debug)]
pub struct EngineFaultEvent {
    /// Display the engine drives.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Failed call.
    pub op: EngineOp,
    /// Error the engine returned.
    pub error: EngineError,
}

/// Emitted when the panel switches refresh rate.
#[derive(Clone, Copy, Debug)]
pub struct RefreshRateChangedEvent {
    /// Display whose panel switched.
    pub display: DisplayId,
    /// Previous rate.
    pub from: u32,
    /// New rate.
    pub to: u32,
}

/// Emitted when an off-screen display's output geometry changes.
#[derive(Clone, Copy, Debug)]
pub struct OutputReconfiguredEvent {
    /// Display reconfigured.
    pub display: DisplayId,
    /// Geometry before, if any was bound.
    pub previous: Option<OutputConfig>,
    /// Geometry now.
    pub current: OutputConfig,
}

/// Emitted when a dumped frame's output buffer has been written.
#[derive(Clone, Copy, Debug)]
pub struct OutputDumpedEvent {
    /// Display dumped.
    pub display: DisplayId,
    /// Frame counter.
    pub frame_index: u64,
    /// Whether the output release fence signalled in time.
    pub signalled: bool,
    /// Frames left to dump.
    pub remaining: u32,
}

/// Emitted when a hot-plug transition has been applied.
#[derive(Clone, Copy, Debug)]
pub struct HotplugAppliedEvent {
    /// Display connected or disconnected.
    pub display: DisplayId,
    /// Whether it is now connected.
    pub connected: bool,
}

/// The composition assigned to one layer.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct CompositionRecord {
    /// Index of the layer in the stack.
    pub layer_index: u32,
    /// Composition the engine assigned.
    pub composition: Composition,
    /// Whether the layer was updating.
    pub updating: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the display pipeline.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called at the end of prepare.
    fn on_frame_prepared(&mut self, e: &FramePreparedEvent) {
        _ = e;
    }

    /// Called at the beginning of a pipeline phase.
    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        _ = e;
    }

    /// Called at the end of a pipeline phase.
    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        _ = e;
    }

    /// Called after post-commit.
    fn on_frame_committed(&mut self, e: &FrameCommittedEvent) {
        _ = e;
    }

    /// Called when a frame is flushed.
    fn on_frame_flushed(&mut self, e: &FrameFlushedEvent) {
        _ = e;
    }

    /// Called when an engine failure is absorbed.
    fn on_engine_fault(&mut self, e: &EngineFaultEvent) {
        _ = e;
    }

    /// Called when the refresh rate changes.
    fn on_refresh_rate_changed(&mut self, e: &RefreshRateChangedEvent) {
        _ = e;
    }

    /// Called when an output is reconfigured.
    fn on_output_reconfigured(&mut self, e: &OutputReconfiguredEvent) {
        _ = e;
    }

    /// Called when a dumped frame is ready.
    fn on_output_dumped(&mut self, e: &OutputDumpedEvent) {
        _ = e;
    }

    /// Called when a hot-plug transition is applied.
    fn on_hotplug_applied(&mut self, e: &HotplugAppliedEvent) {
        _ = e;
    }

    /// Called with per-layer compositions (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_compositions(
        &mut self,
        display: DisplayId,
        frame_index: u64,
        layers: &[CompositionRecord],
    ) {
        _ = (display, frame_index, layers);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! tracer_methods {
    ($($(#[$doc:meta])* $name:ident => $hook:ident($event:ty);)*) => {
        $(
            $(#[$doc])*
            #[inline]
            pub fn $name(&mut self, e: &$event) {
                #[cfg(feature = "trace")]
                if let Some(s) = &mut self.sink {
                    s.$hook(e);
                }
                #[cfg(not(feature = "trace"))]
                {
                    _ = e;
                }
            }
        )*
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    tracer_methods! {
        /// Emits a [`FramePreparedEvent`].
        frame_prepared => on_frame_prepared(FramePreparedEvent);
        /// Emits a [`PhaseBeginEvent`].
        phase_begin => on_phase_begin(PhaseBeginEvent);
        /// Emits a [`PhaseEndEvent`].
        phase_end => on_phase_end(PhaseEndEvent);
        /// Emits a [`FrameCommittedEvent`].
        frame_committed => on_frame_committed(FrameCommittedEvent);
        /// Emits a [`FrameFlushedEvent`].
        frame_flushed => on_frame_flushed(FrameFlushedEvent);
        /// Emits an [`EngineFaultEvent`].
        engine_fault => on_engine_fault(EngineFaultEvent);
        /// Emits a [`RefreshRateChangedEvent`].
        refresh_rate_changed => on_refresh_rate_changed(RefreshRateChangedEvent);
        /// Emits an [`OutputReconfiguredEvent`].
        output_reconfigured => on_output_reconfigured(OutputReconfiguredEvent);
        /// Emits an [`OutputDumpedEvent`].
        output_dumped => on_output_dumped(OutputDumpedEvent);
        /// Emits a [`HotplugAppliedEvent`].
        hotplug_applied => on_hotplug_applied(HotplugAppliedEvent);
    }

    /// Emits per-layer compositions (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn compositions(
        &mut self,
        display: DisplayId,
        frame_index: u64,
        layers: &[CompositionRecord],
    ) {
        if let Some(s) = &mut self.sink {
            s.on_compositions(display, frame_index, layers);
        }
    }

    /// Whether events reach a sink. Lets callers skip building rich payloads.
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        #[cfg(feature = "trace")]
        {
            self.sink.is_some()
        }
        #[cfg(not(feature = "trace"))]
        {
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
