// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-frame layer stack.

use alloc::vec::Vec;

use super::model::{Composition, Layer, LayerBuffer, LayerRect};
use crate::fence::Fence;

bitflags::bitflags! {
    /// Frame-wide properties, the union of what the layers carry plus what
    /// the window system reported for the frame.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StackFlags: u32 {
        /// At least one layer is video.
        const VIDEO = 1 << 0;
        /// At least one layer is secure.
        const SECURE = 1 << 1;
        /// At least one layer must be composited by the window system.
        const SKIP = 1 << 2;
        /// Layer count, order or geometry changed since the last frame.
        const GEOMETRY_CHANGED = 1 << 3;
        /// At least one layer is a cursor.
        const CURSOR = 1 << 4;
        /// A screen-rotation animation is in progress.
        const ANIMATING = 1 << 5;
    }
}

/// The engine-facing description of one frame on one display.
///
/// Layers are ordered bottom to top. Rectangle lists live in a pool shared by
/// all layers and are addressed through each layer's
/// [`RectRange`](super::RectRange)s.
#[derive(Debug, Default)]
pub struct LayerStack {
    pub(crate) layers: Vec<Layer>,
    pub(crate) rects: Vec<LayerRect>,
    pub(crate) flags: StackFlags,
    pub(crate) output_buffer: Option<LayerBuffer>,
    pub(crate) retire_fence: Option<Fence>,
}

impl LayerStack {
    /// Layers, bottom to top.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Mutable layers, for the engine to assign compositions and set release
    /// fences.
    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    /// Number of layers, including the GPU target.
    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Whether the stack holds no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Frame-wide flags.
    #[must_use]
    pub fn flags(&self) -> StackFlags {
        self.flags
    }

    /// Index of the GPU target layer, if present.
    #[must_use]
    pub fn gpu_target_index(&self) -> Option<usize> {
        self.layers
            .iter()
            .rposition(|l| l.composition == Composition::GpuTarget)
    }

    /// Visible rectangles of `layer`.
    #[must_use]
    pub fn visible_rects(&self, layer: &Layer) -> &[LayerRect] {
        self.rects.get(layer.visible.indices()).unwrap_or(&[])
    }

    /// Dirty rectangles of `layer`.
    #[must_use]
    pub fn dirty_rects(&self, layer: &Layer) -> &[LayerRect] {
        self.rects.get(layer.dirty.indices()).unwrap_or(&[])
    }

    /// Blit rectangles of `layer`.
    #[must_use]
    pub fn blit_rects(&self, layer: &Layer) -> &[LayerRect] {
        self.rects.get(layer.blit.indices()).unwrap_or(&[])
    }

    /// Mutable blit rectangles of the layer at `index`, for the engine to fill
    /// in.
    pub fn blit_rects_mut(&mut self, index: usize) -> &mut [LayerRect] {
        let Some(range) = self.layers.get(index).map(|l| l.blit.indices()) else {
            return &mut [];
        };
        self.rects.get_mut(range).unwrap_or(&mut [])
    }

    /// Output buffer of an off-screen display or a frame dump.
    #[must_use]
    pub fn output_buffer(&self) -> Option<&LayerBuffer> {
        self.output_buffer.as_ref()
    }

    /// Mutable output buffer, for the engine to set its release fence.
    pub fn output_buffer_mut(&mut self) -> Option<&mut LayerBuffer> {
        self.output_buffer.as_mut()
    }

    /// Sets the fence that signals when this frame leaves the screen.
    pub fn set_retire_fence(&mut self, fence: Fence) {
        self.retire_fence = Some(fence);
    }

    /// Takes the retire fence, if the engine produced one.
    pub fn take_retire_fence(&mut self) -> Option<Fence> {
        self.retire_fence.take()
    }

    /// Bytes of arena storage the stack currently occupies.
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.layers.len() * super::builder::LAYER_BYTES
            + self.rects.len() * size_of::<LayerRect>()
    }

    /// Empties the stack, closing any fences it still holds, without releasing
    /// storage.
    pub(crate) fn clear(&mut self) {
        self.layers.clear();
        self.rects.clear();
        self.flags = StackFlags::empty();
        self.output_buffer = None;
        self.retire_fence = None;
    }
}
