// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test doubles shared by the unit tests.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use crate::buffer::{AllocError, AllocatedBufferInfo, BufferAllocator, BufferConfig, buffer_size};
use crate::content::BufferId;
use crate::engine::{
    DisplayAttributes, DisplayEngine, EngineError, OutputConfig, PowerMode,
};
use crate::fence::{Fence, FenceError, SyncFile};
use crate::format::aligned_dimensions;
use crate::layer::{Composition, Layer, LayerBuffer, LayerFlags, LayerRect, LayerStack};

/// Deterministic xorshift64 generator for randomized properties.
#[derive(Debug)]
pub(crate) struct XorShift(u64);

impl XorShift {
    pub(crate) fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub(crate) fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform-ish value in `0..n`, or 0 when `n` is 0.
    pub(crate) fn below(&mut self, n: u32) -> u32 {
        if n == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(n)) as u32
    }
}

/// A stack of `(buffer id, composition)` layers with opaque plane alpha.
pub(crate) fn stack_of(layers: &[(u64, Composition)]) -> LayerStack {
    let mut stack = LayerStack::default();
    for &(id, composition) in layers {
        stack.layers.push(Layer {
            buffer: LayerBuffer {
                id: BufferId(id),
                ..LayerBuffer::default()
            },
            plane_alpha: u8::MAX,
            composition,
            ..Layer::default()
        });
    }
    stack
}

// ---------------------------------------------------------------------------
// Fences
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct FenceCounters {
    created: AtomicUsize,
    closed: AtomicUsize,
    next_fd: AtomicI32,
}

/// Hands out fences and counts how many are still open.
#[derive(Clone, Debug, Default)]
pub(crate) struct CountingFences {
    counters: Arc<FenceCounters>,
}

impl CountingFences {
    fn make(&self, signalled: bool) -> Fence {
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        let fd = 100 + self.counters.next_fd.fetch_add(1, Ordering::Relaxed);
        Fence::new(CountingFile {
            fd,
            signalled,
            released: false,
            counters: Arc::clone(&self.counters),
        })
    }

    /// A fence that has already signalled.
    pub(crate) fn fence(&self) -> Fence {
        self.make(true)
    }

    /// A fence that never signals.
    pub(crate) fn pending(&self) -> Fence {
        self.make(false)
    }

    /// Fences created and not yet closed. Released descriptors count as open.
    pub(crate) fn open(&self) -> usize {
        self.counters.created.load(Ordering::Relaxed) - self.closed()
    }

    pub(crate) fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
struct CountingFile {
    fd: i32,
    signalled: bool,
    released: bool,
    counters: Arc<FenceCounters>,
}

impl SyncFile for CountingFile {
    fn raw_fd(&self) -> i32 {
        self.fd
    }

    fn wait(&self, _timeout_ms: u32) -> Result<(), FenceError> {
        if self.signalled {
            Ok(())
        } else {
            Err(FenceError::Timeout)
        }
    }

    fn into_raw_fd(mut self: Box<Self>) -> i32 {
        self.released = true;
        self.fd
    }
}

impl Drop for CountingFile {
    fn drop(&mut self) {
        if !self.released {
            self.counters.closed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// A scripted composition engine.
///
/// Source layers listed in `gpu_layers`, and layers flagged skip, are
/// assigned GPU composition; every other source layer goes to hardware. On
/// commit every layer gets a release fence, and the stack a retire fence.
#[derive(Debug)]
pub(crate) struct FakeEngine {
    pub(crate) attributes: DisplayAttributes,
    pub(crate) fences: CountingFences,
    pub(crate) gpu_layers: Vec<usize>,
    pub(crate) prepare_error: Option<EngineError>,
    pub(crate) commit_error: Option<EngineError>,
    pub(crate) output_config_error: Option<EngineError>,
    pub(crate) prepare_calls: usize,
    pub(crate) commit_calls: usize,
    pub(crate) flush_calls: usize,
    pub(crate) acquire_fences_seen: usize,
    pub(crate) output_seen: usize,
    pub(crate) refresh_rates: Vec<u32>,
    pub(crate) power_modes: Vec<PowerMode>,
    pub(crate) output_configs: Vec<OutputConfig>,
    pub(crate) idle_timeouts: Vec<u32>,
    pub(crate) mixer_stages: Vec<u32>,
    pub(crate) active_configs: Vec<u32>,
    pub(crate) events: Vec<&'static str>,
    /// Destination rects of the last prepared stack.
    pub(crate) dst_rects: Vec<LayerRect>,
}

impl FakeEngine {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self::with_attributes(DisplayAttributes::fixed(width, height, 60))
    }

    pub(crate) fn with_attributes(attributes: DisplayAttributes) -> Self {
        Self {
            attributes,
            fences: CountingFences::default(),
            gpu_layers: Vec::new(),
            prepare_error: None,
            commit_error: None,
            output_config_error: None,
            prepare_calls: 0,
            commit_calls: 0,
            flush_calls: 0,
            acquire_fences_seen: 0,
            output_seen: 0,
            refresh_rates: Vec::new(),
            power_modes: Vec::new(),
            output_configs: Vec::new(),
            idle_timeouts: Vec::new(),
            mixer_stages: Vec::new(),
            active_configs: Vec::new(),
            events: Vec::new(),
            dst_rects: Vec::new(),
        }
    }
}

impl DisplayEngine for FakeEngine {
    fn attributes(&self) -> DisplayAttributes {
        self.attributes
    }

    fn prepare(&mut self, stack: &mut LayerStack) -> Result<(), EngineError> {
        self.prepare_calls += 1;
        self.events.push("prepare");
        if let Some(e) = self.prepare_error.take() {
            return Err(e);
        }
        self.dst_rects = stack.layers().iter().map(|l| l.dst_rect).collect();
        for (i, layer) in stack.layers_mut().iter_mut().enumerate() {
            if layer.composition.is_target() {
                continue;
            }
            layer.composition =
                if self.gpu_layers.contains(&i) || layer.flags.contains(LayerFlags::SKIP) {
                    Composition::Gpu
                } else {
                    Composition::Hardware
                };
        }
        Ok(())
    }

    fn commit(&mut self, stack: &mut LayerStack) -> Result<(), EngineError> {
        self.commit_calls += 1;
        self.events.push("commit");
        for layer in stack.layers() {
            self.acquire_fences_seen += usize::from(layer.buffer.acquire_fence.is_some());
        }
        self.output_seen += usize::from(stack.output_buffer().is_some());
        if let Some(e) = self.commit_error.take() {
            return Err(e);
        }
        for layer in stack.layers_mut() {
            layer.buffer.release_fence = Some(self.fences.fence());
        }
        if let Some(out) = stack.output_buffer_mut() {
            out.release_fence = Some(self.fences.fence());
        }
        stack.set_retire_fence(self.fences.fence());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        self.flush_calls += 1;
        self.events.push("flush");
        Ok(())
    }

    fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), EngineError> {
        self.power_modes.push(mode);
        Ok(())
    }

    fn set_refresh_rate(&mut self, refresh_rate: u32) -> Result<(), EngineError> {
        self.refresh_rates.push(refresh_rate);
        Ok(())
    }

    fn set_output_config(&mut self, config: &OutputConfig) -> Result<(), EngineError> {
        self.events.push("set_output_config");
        if let Some(e) = self.output_config_error.take() {
            return Err(e);
        }
        self.output_configs.push(*config);
        Ok(())
    }

    fn set_active_config(&mut self, index: u32) -> Result<(), EngineError> {
        self.active_configs.push(index);
        Ok(())
    }

    fn set_idle_timeout(&mut self, timeout_ms: u32) -> Result<(), EngineError> {
        self.idle_timeouts.push(timeout_ms);
        Ok(())
    }

    fn set_max_mixer_stages(&mut self, stages: u32) -> Result<(), EngineError> {
        self.mixer_stages.push(stages);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub(crate) struct AllocStats {
    allocated: AtomicUsize,
    freed: AtomicUsize,
}

impl AllocStats {
    pub(crate) fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    pub(crate) fn freed(&self) -> usize {
        self.freed.load(Ordering::Relaxed)
    }
}

/// An allocator that hands out fake descriptors and counts calls.
#[derive(Debug, Default)]
pub(crate) struct FakeAllocator {
    stats: Arc<AllocStats>,
    pub(crate) fail: bool,
}

impl FakeAllocator {
    pub(crate) fn stats(&self) -> Arc<AllocStats> {
        Arc::clone(&self.stats)
    }
}

impl BufferAllocator for FakeAllocator {
    fn allocate(&mut self, config: &BufferConfig) -> Result<AllocatedBufferInfo, AllocError> {
        if self.fail {
            return Err(AllocError::OutOfMemory);
        }
        let size = buffer_size(config)?;
        let (aligned_width, aligned_height) =
            aligned_dimensions(config.width, config.height, config.format);
        let n = self.stats.allocated.fetch_add(1, Ordering::Relaxed);
        Ok(AllocatedBufferInfo {
            fd: 500 + n as i32,
            stride: crate::buffer::stride_bytes(config),
            aligned_width,
            aligned_height,
            size,
            format: config.format,
        })
    }

    fn free(&mut self, _info: AllocatedBufferInfo) {
        self.stats.freed.fetch_add(1, Ordering::Relaxed);
    }
}
