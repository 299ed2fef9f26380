// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer allocation contract.
//!
//! The core never allocates display memory itself. Displays that need a
//! buffer of their own (output frame dumps) describe it with a
//! [`BufferConfig`] and ask a [`BufferAllocator`]; the returned
//! [`AllocatedBufferInfo`] is kept in a [`BufferSlot`] so that it is freed
//! exactly once.

use crate::format::{LayerBufferFormat, aligned_dimensions};

/// Allocation granularity for ordinary buffers.
pub const PAGE_BYTES: usize = 4 * 1024;

/// Allocation granularity for secure buffers.
pub const SECURE_ALIGN_BYTES: usize = 1024 * 1024;

/// Errors from the buffer allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum AllocError {
    /// Not enough memory for the request.
    #[error("out of memory")]
    OutOfMemory,
    /// The request describes an empty or unrepresentable buffer.
    #[error("invalid buffer configuration")]
    InvalidConfig,
}

/// Description of the buffers to allocate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferConfig {
    /// Width in pixels, before alignment.
    pub width: u32,
    /// Height in pixels, before alignment.
    pub height: u32,
    /// Pixel format.
    pub format: LayerBufferFormat,
    /// Number of buffers sharing one allocation.
    pub buffer_count: u32,
    /// Allocate from the protected heap.
    pub secure: bool,
    /// Map with CPU caching enabled.
    pub cacheable: bool,
}

/// A successful allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllocatedBufferInfo {
    /// Memory file descriptor, owned by the allocator until freed.
    pub fd: i32,
    /// Row stride in bytes.
    pub stride: u32,
    /// Aligned width in pixels.
    pub aligned_width: u32,
    /// Aligned height in pixels.
    pub aligned_height: u32,
    /// Total size of the allocation in bytes.
    pub size: usize,
    /// Pixel format.
    pub format: LayerBufferFormat,
}

/// Allocates and frees display buffers.
pub trait BufferAllocator {
    /// Allocates memory for `config`.
    fn allocate(&mut self, config: &BufferConfig) -> Result<AllocatedBufferInfo, AllocError>;

    /// Frees an allocation.
    fn free(&mut self, info: AllocatedBufferInfo);

    /// Bytes an allocation for `config` occupies.
    fn size(&self, config: &BufferConfig) -> Result<usize, AllocError> {
        buffer_size(config)
    }
}

/// Bytes needed for `config`: aligned width × height × bytes per pixel ×
/// buffer count, rounded up to the allocation granularity.
pub fn buffer_size(config: &BufferConfig) -> Result<usize, AllocError> {
    if config.width == 0 || config.height == 0 || config.buffer_count == 0 {
        return Err(AllocError::InvalidConfig);
    }
    let (w, h) = aligned_dimensions(config.width, config.height, config.format);
    let (num, den) = config.format.bytes_per_pixel();
    let bytes = u64::from(w) * u64::from(h) * u64::from(num) / u64::from(den);
    let total = bytes
        .checked_mul(u64::from(config.buffer_count))
        .ok_or(AllocError::InvalidConfig)?;
    let align = if config.secure {
        SECURE_ALIGN_BYTES
    } else {
        PAGE_BYTES
    };
    usize::try_from(total)
        .ok()
        .and_then(|t| t.checked_next_multiple_of(align))
        .ok_or(AllocError::InvalidConfig)
}

/// Row stride in bytes for the first plane of an aligned buffer.
#[must_use]
pub fn stride_bytes(config: &BufferConfig) -> u32 {
    let (w, _) = aligned_dimensions(config.width, config.height, config.format);
    let (num, den) = config.format.bytes_per_pixel();
    if config.format.is_yuv() {
        // Planar and semi-planar luma rows are one byte per pixel.
        w
    } else {
        w.saturating_mul(num) / den
    }
}

/// Holds at most one allocation and frees it exactly once.
#[derive(Debug, Default)]
pub struct BufferSlot {
    info: Option<AllocatedBufferInfo>,
}

impl BufferSlot {
    /// An empty slot.
    #[must_use]
    pub const fn new() -> Self {
        Self { info: None }
    }

    /// The held allocation.
    #[must_use]
    pub fn info(&self) -> Option<&AllocatedBufferInfo> {
        self.info.as_ref()
    }

    /// Whether the slot holds an allocation.
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.info.is_some()
    }

    /// Allocates into the slot, freeing whatever it held before.
    pub fn allocate(
        &mut self,
        allocator: &mut dyn BufferAllocator,
        config: &BufferConfig,
    ) -> Result<&AllocatedBufferInfo, AllocError> {
        self.free(allocator);
        let info = allocator.allocate(config)?;
        Ok(self.info.insert(info))
    }

    /// Frees the held allocation. Freeing an empty slot does nothing.
    pub fn free(&mut self, allocator: &mut dyn BufferAllocator) {
        if let Some(info) = self.info.take() {
            allocator.free(info);
        }
    }
}
