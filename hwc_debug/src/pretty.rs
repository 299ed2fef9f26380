// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Phase
//! timestamps are converted to microseconds using a [`Timebase`].

use std::io::Write;

use hwc_core::output::DisplayId;
use hwc_core::time::{HostTime, Timebase};
use hwc_core::trace::{
    CompositionRecord, EngineFaultEvent, FrameCommittedEvent, FrameFlushedEvent,
    FramePreparedEvent, HotplugAppliedEvent, OutputDumpedEvent, OutputReconfiguredEvent,
    PhaseBeginEvent, PhaseEndEvent, RefreshRateChangedEvent, TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
    timebase: Timebase,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink")
            .field("timebase", &self.timebase)
            .finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr(timebase: Timebase) -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
            timebase,
        }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W, timebase: Timebase) -> Self {
        Self { writer, timebase }
    }

    /// Returns the destination.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn us(&self, t: HostTime) -> f64 {
        self.timebase.ticks_to_micros(t.ticks())
    }
}

fn display_name(id: DisplayId) -> String {
    match id {
        DisplayId::PRIMARY => "primary".to_owned(),
        DisplayId::EXTERNAL => "external".to_owned(),
        DisplayId::VIRTUAL => "virtual".to_owned(),
        DisplayId(other) => other.to_string(),
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_frame_prepared(&mut self, e: &FramePreparedEvent) {
        let rate = e
            .metadata_refresh_rate
            .map_or_else(|| "-".to_owned(), |r| format!("{r}Hz"));
        let _ = writeln!(
            self.writer,
            "[prepare] {} frame={} layers={} flush={} refresh={} one_updating={} metadata={rate}",
            display_name(e.display),
            e.frame_index,
            e.layer_count,
            e.flush,
            e.needs_refresh,
            e.one_layer_updating,
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:begin] {} frame={} {} at {:.1}µs",
            display_name(e.display),
            e.frame_index,
            e.phase.name(),
            self.us(e.timestamp),
        );
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let _ = writeln!(
            self.writer,
            "[phase:end] {} frame={} {} at {:.1}µs",
            display_name(e.display),
            e.frame_index,
            e.phase.name(),
            self.us(e.timestamp),
        );
    }

    fn on_frame_committed(&mut self, e: &FrameCommittedEvent) {
        let _ = writeln!(
            self.writer,
            "[commit] {} frame={} released={} closed={} retire={}",
            display_name(e.display),
            e.frame_index,
            e.released_fences,
            e.closed_fences,
            e.retire_fence,
        );
    }

    fn on_frame_flushed(&mut self, e: &FrameFlushedEvent) {
        let _ = writeln!(
            self.writer,
            "[flush] {} frame={} reason={:?}",
            display_name(e.display),
            e.frame_index,
            e.reason,
        );
    }

    fn on_engine_fault(&mut self, e: &EngineFaultEvent) {
        let _ = writeln!(
            self.writer,
            "[fault] {} frame={} op={:?} error={}",
            display_name(e.display),
            e.frame_index,
            e.op,
            e.error,
        );
    }

    fn on_refresh_rate_changed(&mut self, e: &RefreshRateChangedEvent) {
        let _ = writeln!(
            self.writer,
            "[refresh] {} {}Hz -> {}Hz",
            display_name(e.display),
            e.from,
            e.to,
        );
    }

    fn on_output_reconfigured(&mut self, e: &OutputReconfiguredEvent) {
        let previous = e.previous.map_or_else(
            || "unbound".to_owned(),
            |p| format!("{}x{} {:?}", p.width, p.height, p.format),
        );
        let _ = writeln!(
            self.writer,
            "[output] {} {previous} -> {}x{} {:?}",
            display_name(e.display),
            e.current.width,
            e.current.height,
            e.current.format,
        );
    }

    fn on_output_dumped(&mut self, e: &OutputDumpedEvent) {
        let _ = writeln!(
            self.writer,
            "[dump] {} frame={} signalled={} remaining={}",
            display_name(e.display),
            e.frame_index,
            e.signalled,
            e.remaining,
        );
    }

    fn on_hotplug_applied(&mut self, e: &HotplugAppliedEvent) {
        let state = if e.connected { "connected" } else { "disconnected" };
        let _ = writeln!(self.writer, "[hotplug] {} {state}", display_name(e.display));
    }

    fn on_compositions(
        &mut self,
        display: DisplayId,
        frame_index: u64,
        layers: &[CompositionRecord],
    ) {
        let updating = layers.iter().filter(|l| l.updating).count();
        let _ = write!(
            self.writer,
            "[compositions] {} frame={frame_index} updating={updating}",
            display_name(display),
        );
        for l in layers {
            let _ = write!(self.writer, " {}:{:?}", l.layer_index, l.composition);
        }
        let _ = writeln!(self.writer);
    }
}
