// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session errors.

use hwc_core::error::DisplayError;
use hwc_core::output::DisplayId;

/// Why a session operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The display is not connected, or the id names no display slot.
    #[error("no such display: {0:?}")]
    NoSuchDisplay(DisplayId),
    /// The display is already connected.
    #[error("display already connected: {0:?}")]
    AlreadyConnected(DisplayId),
    /// A display operation failed.
    #[error(transparent)]
    Display(#[from] DisplayError),
    /// A system call failed.
    #[error("i/o error: {0}")]
    Io(#[from] rustix::io::Errno),
}
