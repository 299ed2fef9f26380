// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors surfaced by display operations.

use crate::engine::EngineError;

/// Why a display operation failed.
///
/// Per-layer helper failures (format resolution, rectangle translation) are
/// never reported individually: the whole frame fails with one of these, and
/// the display falls back to flushing the previous frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    /// The layer-stack arena or a buffer allocation could not be grown.
    #[error("out of memory while building the layer stack")]
    OutOfMemory,
    /// The content list or a command payload was malformed.
    #[error("invalid parameters: {0}")]
    InvalidParameters(&'static str),
    /// A buffer carried a window-system pixel format with no internal
    /// equivalent.
    #[error("unsupported pixel format {0:#x}")]
    UnsupportedFormat(u32),
    /// The composition engine rejected a request outside the frame path.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}
