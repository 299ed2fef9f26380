// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Move-only sync fences and the protocol for handing them around.
//!
//! A [`Fence`] owns one sync file. Dropping it closes the file; the only way
//! to keep the file alive past the handle is [`Fence::release`], which gives
//! the raw descriptor to whoever asked for it. Because fences cannot be
//! copied, "closed exactly once" and "never read after close" fall out of
//! ownership.
//!
//! [`FenceLifecycle`] moves fences between the window system's
//! [`ContentList`] and the core's [`LayerStack`] at each pipeline phase:
//!
//! | phase | acquire fences | release / retire fences |
//! |---|---|---|
//! | prepare | left with the caller | - |
//! | commit | moved into the stack, closed after the engine returns | produced by the engine |
//! | flush | closed | closed |
//! | post-commit | remaining ones closed | handed back for non-GPU layers, closed otherwise |

use alloc::boxed::Box;
use core::fmt;

use crate::content::ContentList;
use crate::layer::{Composition, LayerFlags, LayerStack};

/// Errors from waiting on a fence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
pub enum FenceError {
    /// The fence did not signal within the timeout.
    #[error("fence wait timed out")]
    Timeout,
    /// The underlying sync file is not valid.
    #[error("invalid sync file")]
    Invalid,
}

/// A platform sync file.
///
/// Implementations close the underlying file when dropped.
pub trait SyncFile: fmt::Debug + Send {
    /// The raw descriptor, for engines that duplicate it.
    fn raw_fd(&self) -> i32;

    /// Blocks until the fence signals or `timeout_ms` elapses.
    fn wait(&self, timeout_ms: u32) -> Result<(), FenceError>;

    /// Gives up ownership of the descriptor without closing it.
    fn into_raw_fd(self: Box<Self>) -> i32;
}

/// An owned sync fence.
#[derive(Debug)]
pub struct Fence(Box<dyn SyncFile>);

impl Fence {
    /// Wraps a sync file.
    #[must_use]
    pub fn new(file: impl SyncFile + 'static) -> Self {
        Self(Box::new(file))
    }

    /// The raw descriptor, still owned by this handle.
    #[must_use]
    pub fn raw_fd(&self) -> i32 {
        self.0.raw_fd()
    }

    /// Blocks until the fence signals.
    ///
    /// Only debug paths wait on fences; the frame path never does.
    pub fn wait(&self, timeout_ms: u32) -> Result<(), FenceError> {
        self.0.wait(timeout_ms)
    }

    /// Releases the descriptor to the caller, who becomes responsible for
    /// closing it.
    #[must_use = "the released descriptor must be closed by the caller"]
    pub fn release(self) -> i32 {
        self.0.into_raw_fd()
    }
}

/// What [`FenceLifecycle::post_commit`] handed back to the window system.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PostCommitFences {
    /// Release fences handed back.
    pub released: usize,
    /// Release fences closed instead.
    pub closed: usize,
    /// Whether a retire fence was handed back.
    pub retire: bool,
}

/// Fence ownership rules for one display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FenceLifecycle {
    /// Debug mode where the producer never waits: every fence is closed as
    /// soon as the core sees it.
    pub swap_interval_zero: bool,
}

impl FenceLifecycle {
    /// Creates the lifecycle.
    #[must_use]
    pub const fn new(swap_interval_zero: bool) -> Self {
        Self { swap_interval_zero }
    }

    /// Moves acquire fences from the content list into the stack before the
    /// engine commits.
    ///
    /// Fences of single-buffered layers, and every fence in swap-interval-zero
    /// mode, are closed here instead of reaching the engine.
    pub fn attach_acquire_fences(&self, content: &mut ContentList, stack: &mut LayerStack) {
        for (src, layer) in content.layers.iter_mut().zip(stack.layers_mut()) {
            let fence = src.acquire_fence.take();
            layer.buffer.acquire_fence =
                if self.swap_interval_zero || layer.flags.contains(LayerFlags::SINGLE_BUFFER) {
                    None
                } else {
                    fence
                };
        }
        let output_fence = content.output_acquire_fence.take();
        if let Some(output) = stack.output_buffer_mut() {
            output.acquire_fence = output_fence;
        }
    }

    /// Closes the core's copies of the acquire fences once the engine's commit
    /// has returned. Returns how many were closed.
    pub fn close_acquire_fences(&self, stack: &mut LayerStack) -> usize {
        let mut closed = 0;
        for layer in stack.layers_mut() {
            closed += usize::from(layer.buffer.acquire_fence.take().is_some());
        }
        if let Some(output) = stack.output_buffer_mut() {
            closed += usize::from(output.acquire_fence.take().is_some());
        }
        closed
    }

    /// Closes every fence of an abandoned frame, on both sides.
    pub fn flush(&self, content: &mut ContentList, stack: &mut LayerStack) {
        content.close_acquire_fences();
        for layer in stack.layers_mut() {
            layer.buffer.acquire_fence = None;
            layer.buffer.release_fence = None;
        }
        if let Some(output) = stack.output_buffer_mut() {
            output.acquire_fence = None;
            output.release_fence = None;
        }
        stack.take_retire_fence();
    }

    /// Hands release and retire fences produced by the engine back to the
    /// window system.
    ///
    /// Layers the GPU composed get no release fence: their buffers were
    /// consumed by the window system's own composition. Acquire fences the
    /// caller still holds are closed.
    pub fn post_commit(
        &self,
        stack: &mut LayerStack,
        content: &mut ContentList,
    ) -> PostCommitFences {
        let mut out = PostCommitFences::default();
        for (layer, dst) in stack.layers_mut().iter_mut().zip(content.layers.iter_mut()) {
            let Some(fence) = layer.buffer.release_fence.take() else {
                continue;
            };
            let hand_back = !self.swap_interval_zero
                && !layer.flags.contains(LayerFlags::SINGLE_BUFFER)
                && layer.composition != Composition::Gpu;
            if hand_back {
                dst.release_fence = Some(fence);
                out.released += 1;
            } else {
                drop(fence);
                out.closed += 1;
            }
        }

        // The output buffer's release fence only matters to frame dumps,
        // which have waited on it by now.
        if let Some(output) = stack.output_buffer_mut() {
            output.release_fence = None;
        }

        if let Some(retire) = stack.take_retire_fence() {
            if !self.swap_interval_zero {
                content.retire_fence = Some(retire);
                out.retire = true;
            }
        }

        content.close_acquire_fences();
        out
    }
}
