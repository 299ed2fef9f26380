// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON snapshots of displays for bug reports.
//!
//! [`FrameDumper`] keeps the latest snapshot of every display it was shown
//! and writes them out as one JSON object keyed by display name.

use std::collections::BTreeMap;
use std::io::{self, Write};

use serde_json::{Value, json};

use hwc_core::display::Display;
use hwc_core::engine::DisplayEngine;
use hwc_core::layer::{Layer, LayerBuffer, LayerRect, LayerStack};
use hwc_core::output::DisplayId;

fn rect(r: &LayerRect) -> Value {
    json!([r.x0, r.y0, r.x1, r.y1])
}

fn rects(rs: &[LayerRect]) -> Value {
    Value::Array(rs.iter().map(rect).collect())
}

fn buffer(b: &LayerBuffer) -> Value {
    let planes: Vec<Value> = b
        .planes
        .iter()
        .take(b.plane_count)
        .map(|p| json!({ "fd": p.fd, "offset": p.offset, "stride": p.stride }))
        .collect();
    json!({
        "id": b.id.0,
        "width": b.width,
        "height": b.height,
        "format": format!("{:?}", b.format),
        "flags": b.flags.iter_names().map(|(n, _)| n).collect::<Vec<_>>(),
        "planes": planes,
        "acquire_fence": b.acquire_fence.as_ref().map(|f| f.raw_fd()),
        "release_fence": b.release_fence.as_ref().map(|f| f.raw_fd()),
    })
}

fn layer(stack: &LayerStack, index: usize, l: &Layer) -> Value {
    json!({
        "index": index,
        "composition": format!("{:?}", l.composition),
        "flags": l.flags.iter_names().map(|(n, _)| n).collect::<Vec<_>>(),
        "buffer": buffer(&l.buffer),
        "src": rect(&l.src_rect),
        "dst": rect(&l.dst_rect),
        "visible": rects(stack.visible_rects(l)),
        "dirty": rects(stack.dirty_rects(l)),
        "blit": stack.blit_rects(l).len(),
        "blending": format!("{:?}", l.blending),
        "rotation": l.transform.rotation.degrees(),
        "flip_h": l.transform.flip_horizontal,
        "flip_v": l.transform.flip_vertical,
        "plane_alpha": l.plane_alpha,
        "frame_rate": l.frame_rate,
    })
}

/// Snapshot of a layer stack.
#[must_use]
pub fn stack_snapshot(stack: &LayerStack) -> Value {
    let layers: Vec<Value> = stack
        .layers()
        .iter()
        .enumerate()
        .map(|(i, l)| layer(stack, i, l))
        .collect();
    json!({
        "flags": stack.flags().iter_names().map(|(n, _)| n).collect::<Vec<_>>(),
        "used_bytes": stack.used_bytes(),
        "layers": layers,
        "output": stack.output_buffer().map(buffer),
    })
}

/// Snapshot of a display's state and last prepared stack.
#[must_use]
pub fn display_snapshot<E: DisplayEngine>(display: &Display<E>) -> Value {
    let attrs = display.attributes();
    json!({
        "kind": format!("{:?}", display.kind()),
        "frame_index": display.frame_index(),
        "power_mode": format!("{:?}", display.power_mode()),
        "paused": display.is_paused(),
        "shut_down": display.is_shut_down(),
        "pending_flush": display.pending_flush().map(|r| format!("{r:?}")),
        "refresh_rate": display.refresh_rate(),
        "refresh_range": [attrs.min_refresh_rate, attrs.max_refresh_rate],
        "resolution": [attrs.width, attrs.height],
        "cache": {
            "in_use": display.cache().is_in_use(),
            "animating": display.cache().is_animating(),
        },
        "stack": stack_snapshot(display.stack()),
    })
}

fn display_key(id: DisplayId) -> String {
    match id {
        DisplayId::PRIMARY => "primary".to_owned(),
        DisplayId::EXTERNAL => "external".to_owned(),
        DisplayId::VIRTUAL => "virtual".to_owned(),
        DisplayId(other) => format!("display-{other}"),
    }
}

/// Keeps the latest snapshot of each display.
#[derive(Debug, Default)]
pub struct FrameDumper {
    snapshots: BTreeMap<DisplayId, Value>,
}

impl FrameDumper {
    /// Creates an empty dumper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the snapshot of `display`.
    pub fn capture<E: DisplayEngine>(&mut self, display: &Display<E>) {
        self.snapshots
            .insert(display.id(), display_snapshot(display));
    }

    /// Forgets a display, e.g. after it was disconnected.
    pub fn forget(&mut self, id: DisplayId) {
        self.snapshots.remove(&id);
    }

    /// The latest snapshot of `id`.
    #[must_use]
    pub fn snapshot(&self, id: DisplayId) -> Option<&Value> {
        self.snapshots.get(&id)
    }

    /// Writes every snapshot as one JSON object.
    pub fn write(&self, writer: &mut dyn Write) -> io::Result<()> {
        let all: serde_json::Map<String, Value> = self
            .snapshots
            .iter()
            .map(|(id, v)| (display_key(*id), v.clone()))
            .collect();
        serde_json::to_writer_pretty(writer, &all)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hwc_core::config::DisplayConfig;
    use hwc_core::content::{BufferHandle, BufferId, ContentLayer, ContentList};
    use hwc_core::engine::{DisplayAttributes, EngineError, PowerMode};
    use hwc_core::format::HalFormat;
    use hwc_core::layer::Composition;
    use hwc_core::trace::Tracer;

    use super::*;

    #[derive(Debug)]
    struct OverlayEngine;

    impl DisplayEngine for OverlayEngine {
        fn attributes(&self) -> DisplayAttributes {
            DisplayAttributes::fixed(320, 240, 60)
        }

        fn prepare(&mut self, stack: &mut LayerStack) -> Result<(), EngineError> {
            for l in stack.layers_mut() {
                if !l.composition.is_target() {
                    l.composition = Composition::Hardware;
                }
            }
            Ok(())
        }

        fn commit(&mut self, _stack: &mut LayerStack) -> Result<(), EngineError> {
            Ok(())
        }

        fn flush(&mut self) -> Result<(), EngineError> {
            Ok(())
        }

        fn set_power_mode(&mut self, _mode: PowerMode) -> Result<(), EngineError> {
            Ok(())
        }

        fn set_refresh_rate(&mut self, _refresh_rate: u32) -> Result<(), EngineError> {
            Ok(())
        }
    }

    fn prepared_display() -> Display<OverlayEngine> {
        let mut display = Display::new(DisplayId::PRIMARY, DisplayConfig::primary(), OverlayEngine)
            .expect("display");
        let h = BufferHandle::new(BufferId(42), 320, 240, HalFormat::RGBA_8888);
        let mut content = ContentList::new(vec![ContentLayer::new(h), ContentLayer::gpu_target(h)]);
        display
            .prepare(&mut content, &mut Tracer::none())
            .expect("prepare");
        display
    }

    #[test]
    fn snapshot_describes_the_prepared_stack() {
        let snap = display_snapshot(&prepared_display());
        assert_eq!(snap["kind"], "Primary");
        assert_eq!(snap["frame_index"], 1);
        let layers = snap["stack"]["layers"].as_array().expect("layers");
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0]["composition"], "Hardware");
        assert_eq!(layers[0]["buffer"]["id"], 42);
        assert_eq!(layers[0]["dst"], json!([0.0, 0.0, 320.0, 240.0]));
        assert_eq!(layers[1]["composition"], "GpuTarget");
        assert!(snap["stack"]["output"].is_null(), "no dump buffer attached");
    }

    #[test]
    fn dumper_keys_snapshots_by_display() {
        let display = prepared_display();
        let mut dumper = FrameDumper::new();
        dumper.capture(&display);
        assert!(dumper.snapshot(DisplayId::PRIMARY).is_some());

        let mut out = Vec::new();
        dumper.write(&mut out).expect("write");
        let parsed: Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(parsed["primary"]["refresh_rate"], 60);

        dumper.forget(DisplayId::PRIMARY);
        assert!(dumper.snapshot(DisplayId::PRIMARY).is_none());
    }
}
