// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format export.
//!
//! [`ChromeTraceSink`] collects events as they happen and
//! [`export`](ChromeTraceSink::export)s them as [Chrome Trace Event
//! Format][spec] JSON, loadable into `chrome://tracing` or
//! [Perfetto](https://ui.perfetto.dev/).
//!
//! Each display is a process (`pid` = display id). Pipeline phases become
//! duration events; everything else is an instant event stamped with the most
//! recent phase timestamp, since the core itself has no clock.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use hwc_core::output::DisplayId;
use hwc_core::time::{HostTime, Timebase};
use hwc_core::trace::{
    CompositionRecord, EngineFaultEvent, FrameCommittedEvent, FrameFlushedEvent,
    FramePreparedEvent, HotplugAppliedEvent, OutputDumpedEvent, OutputReconfiguredEvent,
    PhaseBeginEvent, PhaseEndEvent, RefreshRateChangedEvent, TraceSink,
};

/// Collects trace events for Chrome Trace Event Format export.
#[derive(Debug)]
pub struct ChromeTraceSink {
    timebase: Timebase,
    last_us: f64,
    events: Vec<Value>,
}

impl ChromeTraceSink {
    /// Creates an empty sink converting timestamps with `timebase`.
    #[must_use]
    pub fn new(timebase: Timebase) -> Self {
        Self {
            timebase,
            last_us: 0.0,
            events: Vec::new(),
        }
    }

    /// Events collected so far.
    #[must_use]
    pub fn events(&self) -> &[Value] {
        &self.events
    }

    /// Writes the collected events as a JSON array.
    pub fn export(&self, writer: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, &self.events)?;
        Ok(())
    }

    fn stamp(&mut self, t: HostTime) -> f64 {
        self.last_us = self.timebase.ticks_to_micros(t.ticks());
        self.last_us
    }

    fn instant(&mut self, display: DisplayId, name: &str, cat: &str, args: Value) {
        self.events.push(json!({
            "ph": "i",
            "name": name,
            "cat": cat,
            "ts": self.last_us,
            "pid": display.0,
            "tid": 0,
            "s": "p",
            "args": args,
        }));
    }
}

impl TraceSink for ChromeTraceSink {
    fn on_frame_prepared(&mut self, e: &FramePreparedEvent) {
        self.instant(
            e.display,
            "FramePrepared",
            "Frame",
            json!({
                "frame_index": e.frame_index,
                "layer_count": e.layer_count,
                "flush": e.flush,
                "needs_refresh": e.needs_refresh,
                "one_layer_updating": e.one_layer_updating,
                "metadata_refresh_rate": e.metadata_refresh_rate,
            }),
        );
    }

    fn on_phase_begin(&mut self, e: &PhaseBeginEvent) {
        let ts = self.stamp(e.timestamp);
        self.events.push(json!({
            "ph": "B",
            "name": e.phase.name(),
            "cat": "Phase",
            "ts": ts,
            "pid": e.display.0,
            "tid": 0,
            "args": { "frame_index": e.frame_index },
        }));
    }

    fn on_phase_end(&mut self, e: &PhaseEndEvent) {
        let ts = self.stamp(e.timestamp);
        self.events.push(json!({
            "ph": "E",
            "name": e.phase.name(),
            "cat": "Phase",
            "ts": ts,
            "pid": e.display.0,
            "tid": 0,
            "args": { "frame_index": e.frame_index },
        }));
    }

    fn on_frame_committed(&mut self, e: &FrameCommittedEvent) {
        self.instant(
            e.display,
            "FrameCommitted",
            "Frame",
            json!({
                "frame_index": e.frame_index,
                "released_fences": e.released_fences,
                "closed_fences": e.closed_fences,
                "retire_fence": e.retire_fence,
            }),
        );
    }

    fn on_frame_flushed(&mut self, e: &FrameFlushedEvent) {
        self.instant(
            e.display,
            "FrameFlushed",
            "Frame",
            json!({
                "frame_index": e.frame_index,
                "reason": format!("{:?}", e.reason),
            }),
        );
    }

    fn on_engine_fault(&mut self, e: &EngineFaultEvent) {
        self.instant(
            e.display,
            "EngineFault",
            "Engine",
            json!({
                "frame_index": e.frame_index,
                "op": format!("{:?}", e.op),
                "error": e.error.to_string(),
            }),
        );
    }

    fn on_refresh_rate_changed(&mut self, e: &RefreshRateChangedEvent) {
        self.instant(
            e.display,
            "RefreshRateChanged",
            "Engine",
            json!({ "from": e.from, "to": e.to }),
        );
    }

    fn on_output_reconfigured(&mut self, e: &OutputReconfiguredEvent) {
        let previous = e.previous.map(|p| {
            json!({
                "width": p.width,
                "height": p.height,
                "format": format!("{:?}", p.format),
            })
        });
        self.instant(
            e.display,
            "OutputReconfigured",
            "Output",
            json!({
                "previous": previous,
                "width": e.current.width,
                "height": e.current.height,
                "format": format!("{:?}", e.current.format),
            }),
        );
    }

    fn on_output_dumped(&mut self, e: &OutputDumpedEvent) {
        self.instant(
            e.display,
            "OutputDumped",
            "Output",
            json!({
                "frame_index": e.frame_index,
                "signalled": e.signalled,
                "remaining": e.remaining,
            }),
        );
    }

    fn on_hotplug_applied(&mut self, e: &HotplugAppliedEvent) {
        self.instant(
            e.display,
            "HotplugApplied",
            "Session",
            json!({ "connected": e.connected }),
        );
    }

    fn on_compositions(
        &mut self,
        display: DisplayId,
        frame_index: u64,
        layers: &[CompositionRecord],
    ) {
        let layers: Vec<Value> = layers
            .iter()
            .map(|l| {
                json!({
                    "index": l.layer_index,
                    "composition": format!("{:?}", l.composition),
                    "updating": l.updating,
                })
            })
            .collect();
        self.instant(
            display,
            "Compositions",
            "Rich",
            json!({ "frame_index": frame_index, "layers": layers }),
        );
    }
}
