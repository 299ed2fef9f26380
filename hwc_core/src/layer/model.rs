// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-layer types.

use core::ops::Range;

use crate::content::{BufferHandle, BufferId, HandleFlags};
use crate::fence::Fence;
use crate::format::LayerBufferFormat;
use crate::geometry::LayerTransform;

/// An axis-aligned rectangle in display or buffer pixels.
pub type LayerRect = kurbo::Rect;

/// Maximum number of memory planes a buffer can have.
pub const MAX_PLANES: usize = 4;

/// How a layer reaches the screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Composition {
    /// Composited by the window system into the GPU target.
    #[default]
    Gpu,
    /// Scanned out directly by a display pipe.
    Hardware,
    /// Scanned out by a pipe that also blends with the layers below it.
    Hybrid,
    /// Composited by the 2D blit engine.
    Blit,
    /// The window system's GPU composition result.
    GpuTarget,
    /// The 2D blit engine's composition result.
    BlitTarget,
    /// A cursor composited like any other layer.
    Cursor,
    /// A cursor on the dedicated hardware cursor pipe.
    HwCursor,
}

impl Composition {
    /// Whether this is one of the composition results rather than a source
    /// layer.
    #[must_use]
    pub const fn is_target(self) -> bool {
        matches!(self, Self::GpuTarget | Self::BlitTarget)
    }
}

bitflags::bitflags! {
    /// Per-layer flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct LayerFlags: u32 {
        /// The window system composites this layer itself.
        const SKIP = 1 << 0;
        /// The layer's content changed since the last frame.
        const UPDATING = 1 << 1;
        /// The layer is a solid colour with no buffer.
        const SOLID_FILL = 1 << 2;
        /// The layer is a cursor.
        const CURSOR = 1 << 3;
        /// The producer renders into the buffer while it is on screen.
        const SINGLE_BUFFER = 1 << 4;
    }
}

bitflags::bitflags! {
    /// Properties of a layer's buffer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct BufferFlags: u32 {
        /// Content must only reach protected pipes.
        const SECURE = 1 << 0;
        /// Buffer belongs to a video stream.
        const VIDEO = 1 << 1;
        /// Fields are interlaced.
        const INTERLACED = 1 << 2;
        /// Buffer is macro-tiled.
        const MACRO_TILE = 1 << 3;
    }
}

/// Layer blend mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum LayerBlending {
    /// No blending.
    Opaque,
    /// Colour channels are premultiplied by alpha.
    #[default]
    Premultiplied,
    /// Colour channels are not premultiplied.
    Coverage,
}

/// Memory layout of one buffer plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Plane {
    /// Memory file descriptor, not owned.
    pub fd: i32,
    /// Byte offset of the plane.
    pub offset: u32,
    /// Row stride in bytes.
    pub stride: u32,
}

impl Default for Plane {
    fn default() -> Self {
        Self {
            fd: -1,
            offset: 0,
            stride: 0,
        }
    }
}

/// A layer's pixels and the fences guarding them.
#[derive(Debug)]
pub struct LayerBuffer {
    /// Identity of the window-system buffer.
    pub id: BufferId,
    /// Aligned width in pixels.
    pub width: u32,
    /// Aligned height in pixels.
    pub height: u32,
    /// Internal pixel format.
    pub format: LayerBufferFormat,
    /// Plane layout; only the first [`plane_count`](Self::plane_count) are
    /// meaningful.
    pub planes: [Plane; MAX_PLANES],
    /// Number of planes in use.
    pub plane_count: usize,
    /// Buffer properties.
    pub flags: BufferFlags,
    /// Signals when the producer has finished writing.
    pub acquire_fence: Option<Fence>,
    /// Signals when the display no longer reads the buffer.
    pub release_fence: Option<Fence>,
}

impl Default for LayerBuffer {
    fn default() -> Self {
        Self {
            id: BufferId::default(),
            width: 0,
            height: 0,
            format: LayerBufferFormat::Rgba8888,
            planes: [Plane::default(); MAX_PLANES],
            plane_count: 0,
            flags: BufferFlags::empty(),
            acquire_fence: None,
            release_fence: None,
        }
    }
}

/// A range of rectangles in a stack's shared pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct RectRange {
    /// Index of the first rectangle.
    pub start: u32,
    /// Number of rectangles.
    pub len: u32,
}

impl RectRange {
    /// The range as pool indices.
    #[must_use]
    pub fn indices(self) -> Range<usize> {
        let start = self.start as usize;
        start..start + self.len as usize
    }

    /// Whether the range holds no rectangles.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.len == 0
    }
}

/// One layer of a [`LayerStack`](super::LayerStack).
#[derive(Debug, Default)]
pub struct Layer {
    /// Input buffer.
    pub buffer: LayerBuffer,
    /// Region of the buffer to display.
    pub src_rect: LayerRect,
    /// Region of the display to cover.
    pub dst_rect: LayerRect,
    /// Visible parts of `dst_rect`.
    pub visible: RectRange,
    /// Parts of `dst_rect` that changed.
    pub dirty: RectRange,
    /// Rectangles the blit engine may fill in.
    pub blit: RectRange,
    /// Blend mode.
    pub blending: LayerBlending,
    /// Orientation.
    pub transform: LayerTransform,
    /// Plane alpha, 255 is opaque.
    pub plane_alpha: u8,
    /// Frame rate the producer asked for, or the active rate.
    pub frame_rate: u32,
    /// Composition, assigned by the engine.
    pub composition: Composition,
    /// Layer flags.
    pub flags: LayerFlags,
}

impl LayerBuffer {
    /// Describes a window-system buffer already resolved to `format`.
    ///
    /// `width` and `height` are the aligned dimensions. Fences are attached
    /// later, at commit.
    #[must_use]
    pub fn from_handle(
        handle: &BufferHandle,
        format: LayerBufferFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let mut planes = [Plane::default(); MAX_PLANES];
        planes[0] = Plane {
            fd: handle.fd,
            offset: handle.offset,
            stride: handle.stride,
        };
        let mut flags = BufferFlags::empty();
        flags.set(
            BufferFlags::SECURE,
            handle.flags.contains(HandleFlags::SECURE),
        );
        flags.set(BufferFlags::VIDEO, handle.flags.contains(HandleFlags::VIDEO));
        flags.set(
            BufferFlags::INTERLACED,
            handle.flags.contains(HandleFlags::INTERLACED),
        );
        flags.set(
            BufferFlags::MACRO_TILE,
            handle.flags.contains(HandleFlags::MACRO_TILE),
        );
        Self {
            id: handle.id,
            width,
            height,
            format,
            planes,
            plane_count: format.plane_count(),
            flags,
            acquire_fence: None,
            release_fence: None,
        }
    }
}
