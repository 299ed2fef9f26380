// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The window-system side of a frame.
//!
//! A [`ContentList`] is what the window system hands over for one display on
//! every refresh: an ordered list of [`ContentLayer`]s, the last of which is
//! the GPU target that receives whatever the window system composites itself.
//! After [`Display::prepare`](crate::display::Display::prepare) every layer's
//! [`composition`](ContentLayer::composition) holds the decision the window
//! system must act on, and after
//! [`Display::post_commit`](crate::display::Display::post_commit) the release
//! and retire fences are filled in.

use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::fence::Fence;
use crate::format::HalFormat;

/// Stable identity of a window-system buffer.
///
/// The core only compares identities between frames; it never dereferences
/// them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BufferId(pub u64);

impl fmt::Debug for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferId({:#x})", self.0)
    }
}

bitflags::bitflags! {
    /// Private flags carried by a window-system buffer handle.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HandleFlags: u32 {
        /// Content must only reach protected pipes.
        const SECURE = 1 << 0;
        /// Buffer belongs to a video stream.
        const VIDEO = 1 << 1;
        /// Buffer uses UBWC compression.
        const UBWC = 1 << 2;
        /// Fields are interlaced.
        const INTERLACED = 1 << 3;
        /// Buffer is macro-tiled.
        const MACRO_TILE = 1 << 4;
        /// Producer renders into the buffer while it is on screen.
        const SINGLE_BUFFER = 1 << 5;
    }
}

/// Video slice dimensions published in a buffer's metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slice {
    /// Slice width in pixels.
    pub width: u32,
    /// Slice height in pixels.
    pub height: u32,
}

/// A window-system buffer handle.
///
/// Handles are plain descriptions; the file descriptor they carry stays owned
/// by the window system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    /// Identity used for cache comparisons.
    pub id: BufferId,
    /// Memory file descriptor.
    pub fd: i32,
    /// Byte offset of the first plane.
    pub offset: u32,
    /// Row stride in bytes.
    pub stride: u32,
    /// Unaligned width in pixels.
    pub width: u32,
    /// Unaligned height in pixels.
    pub height: u32,
    /// Window-system pixel format code.
    pub format: HalFormat,
    /// Private handle flags.
    pub flags: HandleFlags,
    /// Frame rate the producer asked for, from buffer metadata.
    pub frame_rate: Option<u32>,
    /// Video slice dimensions, from buffer metadata.
    pub slice: Option<Slice>,
}

impl BufferHandle {
    /// A linear buffer with no metadata.
    #[must_use]
    pub const fn new(id: BufferId, width: u32, height: u32, format: HalFormat) -> Self {
        Self {
            id,
            fd: -1,
            offset: 0,
            stride: 0,
            width,
            height,
            format,
            flags: HandleFlags::empty(),
            frame_rate: None,
            slice: None,
        }
    }
}

bitflags::bitflags! {
    /// Window-system transform bits.
    ///
    /// Rotations by 180 and 270 degrees are spelled as flip combinations.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct HalTransform: u32 {
        /// Mirror horizontally.
        const FLIP_H = 0x01;
        /// Mirror vertically.
        const FLIP_V = 0x02;
        /// Rotate 90 degrees clockwise.
        const ROT_90 = 0x04;
        /// Rotate 180 degrees.
        const ROT_180 = Self::FLIP_H.bits() | Self::FLIP_V.bits();
        /// Rotate 270 degrees clockwise.
        const ROT_270 = Self::ROT_180.bits() | Self::ROT_90.bits();
    }
}

/// Window-system blend mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClientBlending {
    /// No blending; the layer is opaque.
    None,
    /// Colour channels are premultiplied by alpha.
    #[default]
    Premultiplied,
    /// Colour channels are not premultiplied.
    Coverage,
}

/// Composition as the window system understands it.
///
/// On input this is a hint; after prepare it is the decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClientComposition {
    /// The window system composites the layer into the GPU target.
    #[default]
    Client,
    /// The display hardware composes the layer.
    Device,
    /// The GPU target itself.
    Target,
    /// A solid colour layer with no buffer.
    SolidColor,
    /// The hardware cursor plane.
    Cursor,
}

bitflags::bitflags! {
    /// Per-layer window-system flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContentLayerFlags: u32 {
        /// The window system insists on compositing this layer itself.
        const SKIP = 1 << 0;
        /// The layer is a cursor.
        const CURSOR = 1 << 1;
    }
}

/// One layer of a [`ContentList`].
#[derive(Debug, Default)]
pub struct ContentLayer {
    /// Buffer to display; `None` for solid colour layers.
    pub handle: Option<BufferHandle>,
    /// Source crop in buffer coordinates.
    pub crop: Rect,
    /// Destination on the display.
    pub display_frame: Rect,
    /// Visible parts of the destination.
    pub visible_region: Vec<Rect>,
    /// Parts of the destination that changed since the last frame.
    pub surface_damage: Vec<Rect>,
    /// Composition hint in, decision out.
    pub composition: ClientComposition,
    /// Blend mode.
    pub blending: ClientBlending,
    /// Transform bits.
    pub transform: HalTransform,
    /// Plane alpha, 255 is opaque.
    pub plane_alpha: u8,
    /// Window-system flags.
    pub flags: ContentLayerFlags,
    /// Signals when the producer has finished writing the buffer.
    pub acquire_fence: Option<Fence>,
    /// Signals when the display no longer reads the buffer. Filled in by
    /// post-commit.
    pub release_fence: Option<Fence>,
}

impl ContentLayer {
    /// A full-screen layer showing `handle` with identity crop.
    #[must_use]
    pub fn new(handle: BufferHandle) -> Self {
        let bounds = Rect::new(0.0, 0.0, f64::from(handle.width), f64::from(handle.height));
        Self {
            handle: Some(handle),
            crop: bounds,
            display_frame: bounds,
            plane_alpha: u8::MAX,
            ..Self::default()
        }
    }

    /// The GPU target layer for a `width`×`height` display.
    #[must_use]
    pub fn gpu_target(handle: BufferHandle) -> Self {
        Self {
            composition: ClientComposition::Target,
            ..Self::new(handle)
        }
    }

    /// Sets the destination frame.
    #[must_use]
    pub fn with_display_frame(mut self, frame: Rect) -> Self {
        self.display_frame = frame;
        self
    }

    /// Attaches an acquire fence.
    #[must_use]
    pub fn with_acquire_fence(mut self, fence: Fence) -> Self {
        self.acquire_fence = Some(fence);
        self
    }

    /// Whether this is the GPU target.
    #[must_use]
    pub fn is_target(&self) -> bool {
        self.composition == ClientComposition::Target
    }
}

bitflags::bitflags! {
    /// Flags describing a whole [`ContentList`].
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContentListFlags: u32 {
        /// Layer count, order or geometry changed since the last frame.
        const GEOMETRY_CHANGED = 1 << 0;
        /// A screen-rotation animation is in progress.
        const ANIMATING = 1 << 1;
    }
}

/// One display's layers for one frame.
#[derive(Debug, Default)]
pub struct ContentList {
    /// Layers bottom to top; the last one is the GPU target.
    pub layers: Vec<ContentLayer>,
    /// Frame-wide flags.
    pub flags: ContentListFlags,
    /// Output buffer for off-screen displays.
    pub output: Option<BufferHandle>,
    /// Signals when the output buffer may be written.
    pub output_acquire_fence: Option<Fence>,
    /// Signals when this frame has been replaced on screen. Filled in by
    /// post-commit.
    pub retire_fence: Option<Fence>,
}

impl ContentList {
    /// Builds a list from layers, the last of which must be the GPU target.
    #[must_use]
    pub fn new(layers: Vec<ContentLayer>) -> Self {
        Self {
            layers,
            ..Self::default()
        }
    }

    /// Index of the GPU target layer, if present.
    #[must_use]
    pub fn target_index(&self) -> Option<usize> {
        self.layers.iter().rposition(ContentLayer::is_target)
    }

    /// Closes every acquire fence still held by the list.
    pub fn close_acquire_fences(&mut self) -> usize {
        let mut closed = 0;
        for layer in &mut self.layers {
            closed += usize::from(layer.acquire_fence.take().is_some());
        }
        closed + usize::from(self.output_acquire_fence.take().is_some())
    }
}
