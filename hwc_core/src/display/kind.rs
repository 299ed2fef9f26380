// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display kinds and the per-kind strategy state.

use super::dump::FrameDump;
use crate::engine::DisplayAttributes;
use crate::geometry::{ActionSafe, ScanAdjustment};
use crate::virtual_output::VirtualOutputBinder;

/// The kind of display a [`Display`](super::Display) drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DisplayKind {
    /// The built-in panel.
    Primary,
    /// A hot-pluggable external display.
    External,
    /// An off-screen target rendered into a caller-supplied buffer.
    Virtual,
}

/// State only some kinds of display carry.
#[derive(Debug)]
pub(crate) enum KindState {
    Primary { dump: FrameDump },
    External { action_safe: Option<ActionSafe> },
    Virtual { binder: VirtualOutputBinder },
}

impl KindState {
    pub(crate) fn new(kind: DisplayKind, action_safe: Option<ActionSafe>) -> Self {
        match kind {
            DisplayKind::Primary => Self::Primary {
                dump: FrameDump::default(),
            },
            DisplayKind::External => Self::External { action_safe },
            DisplayKind::Virtual => Self::Virtual {
                binder: VirtualOutputBinder::new(),
            },
        }
    }

    /// Scan adjustment for this frame, if the kind applies one.
    pub(crate) fn scan_adjustment(&self, attrs: &DisplayAttributes) -> Option<ScanAdjustment> {
        match self {
            Self::External {
                action_safe: Some(safe),
            } => ScanAdjustment::new(
                *safe,
                attrs.mixer_width,
                attrs.mixer_height,
                attrs.underscan_supported,
            ),
            _ => None,
        }
    }
}
