// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Composition caching across frames.
//!
//! When nothing the GPU composited has changed since the last frame, the GPU
//! target still holds the right pixels and redrawing it would be wasted work.
//! [`CompositionCache`] remembers, per layer slot, the buffer identity, plane
//! alpha and composition of the last prepared frame and answers whether the
//! target must be refreshed.
//!
//! The cache is only valid while the layer list keeps its shape. A geometry
//! change, a skipped layer or a frame with more layers than the cache has
//! slots forces a full refresh.

use alloc::vec;
use alloc::vec::Vec;

use crate::content::BufferId;
use crate::layer::{Composition, LayerFlags, LayerStack, StackFlags};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct SlotEntry {
    buffer: BufferId,
    plane_alpha: u8,
    composition: Composition,
}

/// Per-slot memory of the previous frame on one display.
#[derive(Clone, Debug)]
pub struct CompositionCache {
    slots: Vec<Option<SlotEntry>>,
    layer_count: usize,
    in_use: bool,
    animating: bool,
}

impl CompositionCache {
    /// Creates an empty cache with room for `capacity` layers.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            layer_count: 0,
            in_use: false,
            animating: false,
        }
    }

    /// Number of layer slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Whether the last cached frame was part of a rotation animation.
    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animating
    }

    /// Whether the cache holds a frame.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Whether the frame differs in shape from the cached one, regardless of
    /// per-layer compositions.
    #[must_use]
    pub fn structure_changed(&self, stack: &LayerStack) -> bool {
        let flags = stack.flags();
        if self.animating && !flags.contains(StackFlags::ANIMATING) {
            return true;
        }
        if flags.intersects(StackFlags::SKIP | StackFlags::GEOMETRY_CHANGED) {
            return true;
        }
        !self.in_use || stack.len() != self.layer_count
    }

    /// Whether the GPU target must be redrawn for this frame.
    ///
    /// Compare once the engine has assigned compositions: any composition
    /// change, or a new buffer on a GPU-composed layer, invalidates the
    /// target.
    #[must_use]
    pub fn needs_refresh(&self, stack: &LayerStack) -> bool {
        if self.structure_changed(stack) {
            return true;
        }
        stack
            .layers()
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.composition.is_target())
            .any(|(i, layer)| match self.slots.get(i).copied().flatten() {
                None => true,
                Some(slot) => {
                    slot.composition != layer.composition
                        || (layer.composition == Composition::Gpu && slot.buffer != layer.buffer.id)
                }
            })
    }

    /// Sets each source layer's [`UPDATING`](LayerFlags::UPDATING) flag and
    /// returns whether exactly one of them is updating.
    ///
    /// A layer is updating when it is single-buffered, shows a different
    /// buffer or plane alpha than its slot, or the geometry changed. Frames
    /// larger than the cache count every layer as updating.
    pub fn mark_updating(&self, stack: &mut LayerStack) -> bool {
        let oversized = stack.len() > self.capacity();
        let geometry = stack.flags().contains(StackFlags::GEOMETRY_CHANGED);
        let mut updating_count = 0_usize;
        for (i, layer) in stack.layers_mut().iter_mut().enumerate() {
            if layer.composition.is_target() {
                continue;
            }
            let changed = match self.slots.get(i).copied().flatten() {
                None => true,
                Some(slot) => {
                    slot.buffer != layer.buffer.id || slot.plane_alpha != layer.plane_alpha
                }
            };
            let updating = oversized
                || geometry
                || layer.flags.contains(LayerFlags::SINGLE_BUFFER)
                || changed;
            layer.flags.set(LayerFlags::UPDATING, updating);
            updating_count += usize::from(updating);
        }
        updating_count == 1
    }

    /// Remembers the final compositions of a prepared frame.
    ///
    /// Oversized frames and frames in the middle of an animation reset the
    /// cache instead; only the animation state survives the reset.
    pub fn update(&mut self, stack: &LayerStack) {
        let animating = stack.flags().contains(StackFlags::ANIMATING);
        if stack.len() > self.capacity() || animating {
            self.reset();
            self.animating = animating;
            return;
        }
        for (slot, layer) in self.slots.iter_mut().zip(stack.layers()) {
            if layer.composition.is_target() {
                continue;
            }
            *slot = Some(SlotEntry {
                buffer: layer.buffer.id,
                plane_alpha: layer.plane_alpha,
                composition: layer.composition,
            });
        }
        self.layer_count = stack.len();
        self.animating = false;
        self.in_use = true;
    }

    /// Forgets everything.
    pub fn reset(&mut self) {
        self.slots.fill(None);
        self.layer_count = 0;
        self.in_use = false;
        self.animating = false;
    }
}
