// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pretty-printing, Chrome trace export and frame dumps for `hwc_core`
//! diagnostics.
//!
//! This crate provides [`TraceSink`](hwc_core::trace::TraceSink)
//! implementations and snapshot helpers for development and bug reports:
//!
//! - [`pretty::PrettyPrintSink`]: human-readable one-line-per-event output.
//! - [`chrome::ChromeTraceSink`]: collects events and writes Chrome Trace
//!   Event Format JSON.
//! - [`dump::FrameDumper`]: JSON snapshot of a display and its last prepared
//!   layer stack.

pub mod chrome;
pub mod dump;
pub mod pretty;
