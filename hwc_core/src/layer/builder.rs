// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arena-backed construction of the per-frame layer stack.

use alloc::vec::Vec;

use super::model::{
    BufferFlags, Composition, Layer, LayerBuffer, LayerFlags, LayerRect, RectRange,
};
use super::stack::{LayerStack, StackFlags};
use crate::content::{
    ClientComposition, ContentLayer, ContentLayerFlags, ContentList, ContentListFlags, HandleFlags,
};
use crate::error::DisplayError;
use crate::format;
use crate::geometry::{self, ScanAdjustment};
use crate::refresh::RefreshRateSelector;

/// Arena bytes accounted per layer. A layer embeds its buffer description.
pub(crate) const LAYER_BYTES: usize = size_of::<Layer>();

const RECT_BYTES: usize = size_of::<LayerRect>();

/// Rectangle list lengths of one layer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RectCounts {
    /// Visible rectangles.
    pub visible: usize,
    /// Dirty rectangles.
    pub dirty: usize,
    /// Blit rectangles.
    pub blit: usize,
}

impl RectCounts {
    /// Counts for a content layer. A layer without surface damage gets one
    /// dirty rectangle covering its whole crop.
    #[must_use]
    pub fn of(layer: &ContentLayer, blit: usize) -> Self {
        Self {
            visible: layer.visible_region.len(),
            dirty: layer.surface_damage.len().max(1),
            blit,
        }
    }

    /// Total rectangles.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.visible + self.dirty + self.blit
    }
}

/// Display-specific inputs to [`LayerStackBuilder::populate`].
#[derive(Clone, Copy, Debug)]
pub struct PopulateParams<'a> {
    /// Saturates per-layer frame rates and supplies the active rate.
    pub refresh: &'a RefreshRateSelector,
    /// Scan adjustment applied to destinations, for overscanning sinks.
    pub scan: Option<ScanAdjustment>,
}

/// What [`LayerStackBuilder::populate`] learned about the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    /// Layers in the stack, including the GPU target.
    pub layer_count: usize,
    /// Highest sanitized frame rate any layer asked for.
    pub metadata_refresh_rate: Option<u32>,
}

/// Owns one display's [`LayerStack`] and the storage behind it.
///
/// Storage is sized for the largest frame seen so far, rounded up to a fixed
/// step, and is never shrunk. Rebuilding a stack that fits never allocates.
#[derive(Debug)]
pub struct LayerStackBuilder {
    stack: LayerStack,
    arena_bytes: usize,
    step_bytes: usize,
    blit_rects_per_layer: usize,
}

impl LayerStackBuilder {
    /// Creates a builder with an empty arena.
    #[must_use]
    pub fn new(step_bytes: usize, blit_rects_per_layer: usize) -> Self {
        Self {
            stack: LayerStack::default(),
            arena_bytes: 0,
            step_bytes: step_bytes.max(1),
            blit_rects_per_layer,
        }
    }

    /// The stack built by the last [`populate`](Self::populate).
    #[must_use]
    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    /// Mutable access to the stack.
    pub fn stack_mut(&mut self) -> &mut LayerStack {
        &mut self.stack
    }

    /// Current arena size in bytes.
    #[must_use]
    pub fn arena_bytes(&self) -> usize {
        self.arena_bytes
    }

    /// Blit rectangles reserved per layer.
    #[must_use]
    pub fn blit_rects_per_layer(&self) -> usize {
        self.blit_rects_per_layer
    }

    /// Bytes needed for `layer_count` layers and `rect_count` rectangles.
    #[must_use]
    pub fn required_bytes(layer_count: usize, rect_count: usize) -> Option<usize> {
        layer_count
            .checked_mul(LAYER_BYTES)?
            .checked_add(rect_count.checked_mul(RECT_BYTES)?)
    }

    /// Empties the stack and makes sure the arena can hold `layer_count`
    /// layers with the given rectangle counts.
    ///
    /// When it cannot, the old arena is released and a larger one reserved.
    pub fn allocate(
        &mut self,
        layer_count: usize,
        rects: impl IntoIterator<Item = RectCounts>,
    ) -> Result<(), DisplayError> {
        let rect_total = rects
            .into_iter()
            .try_fold(0_usize, |acc, c| acc.checked_add(c.total()))
            .ok_or(DisplayError::OutOfMemory)?;
        let required =
            Self::required_bytes(layer_count, rect_total).ok_or(DisplayError::OutOfMemory)?;

        self.stack.clear();
        if required <= self.arena_bytes
            && self.stack.layers.capacity() >= layer_count
            && self.stack.rects.capacity() >= rect_total
        {
            return Ok(());
        }

        let layer_cap = layer_count.max(self.stack.layers.capacity());
        let rect_floor = rect_total.max(self.stack.rects.capacity());
        let needed =
            Self::required_bytes(layer_cap, rect_floor).ok_or(DisplayError::OutOfMemory)?;
        let arena = needed
            .max(self.arena_bytes)
            .checked_next_multiple_of(self.step_bytes)
            .ok_or(DisplayError::OutOfMemory)?;
        // Rounding slack goes to the rectangle pool.
        let rect_cap = (arena - layer_cap * LAYER_BYTES) / RECT_BYTES;

        self.stack.layers = Vec::new();
        self.stack.rects = Vec::new();
        self.arena_bytes = 0;
        self.stack
            .layers
            .try_reserve_exact(layer_cap)
            .map_err(|_| DisplayError::OutOfMemory)?;
        self.stack
            .rects
            .try_reserve_exact(rect_cap)
            .map_err(|_| DisplayError::OutOfMemory)?;
        self.arena_bytes = arena;
        Ok(())
    }

    /// Translates every content layer into the stack.
    ///
    /// Must follow an [`allocate`](Self::allocate) sized for the same content;
    /// content that does not fit is rejected rather than grown into.
    pub fn populate(
        &mut self,
        content: &ContentList,
        params: &PopulateParams<'_>,
    ) -> Result<PopulateSummary, DisplayError> {
        self.stack.clear();
        let mut metadata_rate: Option<u32> = None;

        for src in &content.layers {
            let counts = RectCounts::of(src, self.blit_rects_per_layer);
            if self.stack.layers.len() == self.stack.layers.capacity()
                || self.stack.rects.len() + counts.total() > self.stack.rects.capacity()
            {
                return Err(DisplayError::InvalidParameters(
                    "content does not fit the allocated layer stack",
                ));
            }

            let mut layer = translate_layer(src)?;

            if let Some(scan) = &params.scan {
                layer.dst_rect = scan.apply(layer.dst_rect);
            }

            layer.visible = self.push_rects(src.visible_region.iter().map(|r| {
                let r = geometry::destination_rect(*r);
                params.scan.as_ref().map_or(r, |s| s.apply(r))
            }));
            layer.dirty = if src.surface_damage.is_empty() {
                self.push_rects([layer.src_rect])
            } else {
                self.push_rects(src.surface_damage.iter().map(|r| geometry::source_rect(*r)))
            };
            layer.blit = self.push_rects(
                core::iter::repeat_n(LayerRect::ZERO, self.blit_rects_per_layer),
            );

            layer.frame_rate = params.refresh.active();
            if layer.composition != Composition::GpuTarget {
                if let Some(rate) = src.handle.and_then(|h| h.frame_rate) {
                    let rate = params.refresh.sanitize(rate);
                    layer.frame_rate = rate;
                    metadata_rate = Some(metadata_rate.map_or(rate, |m| m.max(rate)));
                }
            }

            let flags = &mut self.stack.flags;
            if layer.buffer.flags.contains(BufferFlags::VIDEO) {
                *flags |= StackFlags::VIDEO;
            }
            if layer.buffer.flags.contains(BufferFlags::SECURE) {
                *flags |= StackFlags::SECURE;
            }
            if layer.flags.contains(LayerFlags::SKIP) {
                *flags |= StackFlags::SKIP;
            }
            if layer.flags.contains(LayerFlags::CURSOR) {
                *flags |= StackFlags::CURSOR;
            }

            self.stack.layers.push(layer);
        }

        if content.flags.contains(ContentListFlags::GEOMETRY_CHANGED) {
            self.stack.flags |= StackFlags::GEOMETRY_CHANGED;
        }
        if content.flags.contains(ContentListFlags::ANIMATING) {
            self.stack.flags |= StackFlags::ANIMATING;
        }

        Ok(PopulateSummary {
            layer_count: self.stack.layers.len(),
            metadata_refresh_rate: metadata_rate,
        })
    }

    fn push_rects(&mut self, rects: impl IntoIterator<Item = LayerRect>) -> RectRange {
        let start = self.stack.rects.len();
        self.stack.rects.extend(rects);
        debug_assert!(
            self.stack.rects.len() <= self.stack.rects.capacity(),
            "rectangle pool grew past the arena"
        );
        RectRange {
            start: u32::try_from(start).unwrap_or(u32::MAX),
            len: u32::try_from(self.stack.rects.len() - start).unwrap_or(0),
        }
    }
}

/// Translates one content layer's buffer, geometry and flags.
fn translate_layer(src: &ContentLayer) -> Result<Layer, DisplayError> {
    let mut layer = Layer {
        composition: if src.is_target() {
            Composition::GpuTarget
        } else {
            Composition::Gpu
        },
        blending: geometry::layer_blending(src.blending),
        transform: geometry::layer_transform(src.transform),
        plane_alpha: src.plane_alpha,
        ..Layer::default()
    };

    match &src.handle {
        Some(handle) => {
            let fmt = format::resolve(handle.format, handle.flags)?;
            let (width, height) = format::aligned_dimensions(handle.width, handle.height, fmt);
            layer.buffer = LayerBuffer::from_handle(handle, fmt, width, height);
            if handle.flags.contains(HandleFlags::SINGLE_BUFFER) {
                layer.flags |= LayerFlags::SINGLE_BUFFER;
            }
        }
        None if src.composition == ClientComposition::SolidColor => {
            layer.flags |= LayerFlags::SOLID_FILL;
        }
        // A bufferless layer the hardware cannot fill is left to the window
        // system. The GPU target may legitimately be empty.
        None if !src.is_target() => layer.flags |= LayerFlags::SKIP,
        None => {}
    }

    layer.src_rect = geometry::source_rect(src.crop);
    if layer.buffer.flags.contains(BufferFlags::INTERLACED) {
        layer.src_rect = geometry::deinterlace(layer.src_rect);
    }
    layer.dst_rect = geometry::destination_rect(src.display_frame);

    if src.flags.contains(ContentLayerFlags::SKIP) {
        layer.flags |= LayerFlags::SKIP;
    }
    if src.flags.contains(ContentLayerFlags::CURSOR) || src.composition == ClientComposition::Cursor
    {
        layer.flags |= LayerFlags::CURSOR;
    }
    Ok(layer)
}
