// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer stack data model.
//!
//! A [`LayerStack`] is the engine-facing view of one frame. Each [`Layer`]
//! has:
//!
//! - A [`LayerBuffer`] describing the pixels: aligned size, internal format,
//!   plane layout and the fences guarding it.
//! - Source and destination rectangles in whole pixels.
//! - Visible, dirty and blit rectangle lists, stored as [`RectRange`]s into
//!   one shared rectangle pool owned by the stack.
//! - The [`Composition`] the engine assigned, plus per-layer [`LayerFlags`].
//!
//! Stacks are never built by hand outside of tests. The
//! [`LayerStackBuilder`] owns one stack per display and rebuilds it in place
//! every frame, growing its storage only when a frame needs more than any
//! frame before it.

mod builder;
mod model;
mod stack;

pub use builder::{LayerStackBuilder, PopulateParams, PopulateSummary, RectCounts};
pub use model::{
    BufferFlags, Composition, Layer, LayerBlending, LayerBuffer, LayerFlags, LayerRect,
    MAX_PLANES, Plane, RectRange,
};
pub use stack::{LayerStack, StackFlags};
