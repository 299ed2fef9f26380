// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output frame dumps on the primary display.

use crate::buffer::{BufferAllocator, BufferConfig, BufferSlot};
use crate::content::BufferId;
use crate::error::DisplayError;
use crate::format::LayerBufferFormat;
use crate::layer::{LayerBuffer, MAX_PLANES, Plane};

/// Identity reported for the dump buffer. Window-system buffers never use it.
pub(crate) const DUMP_BUFFER_ID: BufferId = BufferId(u64::MAX);

/// How long post-commit waits for a dumped frame, in milliseconds.
pub(crate) const DUMP_WAIT_MS: u32 = 1000;

#[derive(Debug, Default)]
pub(crate) struct FrameDump {
    remaining: u32,
    slot: BufferSlot,
}

impl FrameDump {
    pub(crate) fn is_active(&self) -> bool {
        self.remaining > 0
    }

    /// Starts a dump of `frames` frames, replacing any dump in progress.
    pub(crate) fn configure(
        &mut self,
        frames: u32,
        output: bool,
        allocator: Option<&mut dyn BufferAllocator>,
        width: u32,
        height: u32,
    ) -> Result<(), DisplayError> {
        let Some(allocator) = allocator else {
            if output {
                return Err(DisplayError::InvalidParameters(
                    "output dumps need a buffer allocator",
                ));
            }
            self.remaining = frames;
            return Ok(());
        };
        self.slot.free(allocator);
        self.remaining = 0;
        if output && frames > 0 {
            let config = BufferConfig {
                width,
                height,
                format: LayerBufferFormat::Rgba8888,
                buffer_count: 1,
                secure: false,
                cacheable: true,
            };
            self.slot
                .allocate(allocator, &config)
                .map_err(|_| DisplayError::OutOfMemory)?;
        }
        self.remaining = frames;
        Ok(())
    }

    /// The buffer frames are dumped into, if one is allocated.
    pub(crate) fn output_buffer(&self) -> Option<LayerBuffer> {
        if !self.is_active() {
            return None;
        }
        let info = self.slot.info()?;
        let mut planes = [Plane::default(); MAX_PLANES];
        planes[0] = Plane {
            fd: info.fd,
            offset: 0,
            stride: info.stride,
        };
        Some(LayerBuffer {
            id: DUMP_BUFFER_ID,
            width: info.aligned_width,
            height: info.aligned_height,
            format: info.format,
            planes,
            plane_count: 1,
            ..LayerBuffer::default()
        })
    }

    /// Counts one dumped frame and frees the buffer after the last one.
    /// Returns the frames left.
    pub(crate) fn frame_done(&mut self, allocator: Option<&mut dyn BufferAllocator>) -> u32 {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.release(allocator);
        }
        self.remaining
    }

    /// Frees the dump buffer, if any.
    pub(crate) fn release(&mut self, allocator: Option<&mut dyn BufferAllocator>) {
        self.remaining = 0;
        if let Some(allocator) = allocator {
            self.slot.free(allocator);
        }
    }
}
