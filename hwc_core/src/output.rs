// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Display identification.
//!
//! [`DisplayId`] names one of the displays a session drives. The three
//! well-known slots match the displays a composer session manages; the core
//! itself never interprets the value beyond passing it to trace events.

use core::fmt;

/// Identifies a display driven by a session.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DisplayId(pub u32);

impl DisplayId {
    /// The built-in panel.
    pub const PRIMARY: Self = Self(0);
    /// A hot-pluggable external display (HDMI, DisplayPort).
    pub const EXTERNAL: Self = Self(1);
    /// An off-screen target (wireless display, screen recording).
    pub const VIRTUAL: Self = Self(2);

    /// Number of well-known display slots.
    pub const COUNT: usize = 3;

    /// Returns the slot index for this display, if it is a well-known one.
    #[must_use]
    pub fn slot(self) -> Option<usize> {
        let idx = usize::try_from(self.0).ok()?;
        (idx < Self::COUNT).then_some(idx)
    }
}

impl fmt::Debug for DisplayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::PRIMARY => f.write_str("DisplayId(primary)"),
            Self::EXTERNAL => f.write_str("DisplayId(external)"),
            Self::VIRTUAL => f.write_str("DisplayId(virtual)"),
            Self(other) => write!(f, "DisplayId({other})"),
        }
    }
}
