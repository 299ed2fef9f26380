// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-frame layer-stack preparation and composition caching for hardware
//! display composers.
//!
//! `hwc_core` sits between a window-system client, which hands over one
//! [`ContentList`](content::ContentList) per display per refresh, and an
//! opaque composition engine that decides which layers the display hardware
//! can scan out directly. It is `no_std` compatible (with `alloc`); fences and
//! allocators are reached through traits so that platform crates can plug in
//! file-descriptor backed implementations.
//!
//! # Architecture
//!
//! Every refresh runs the same three-phase sequence per display:
//!
//! ```text
//!   ContentList ──► Display::prepare()
//!                       │  LayerStackBuilder::allocate / populate
//!                       │  CompositionCache::needs_refresh
//!                       │  DisplayEngine::prepare ──► compositions assigned
//!                       │  RefreshRateSelector ──► DisplayEngine::set_refresh_rate
//!                       ▼
//!                   Display::commit()
//!                       │  FenceLifecycle: acquire fences handed to the engine
//!                       │  DisplayEngine::commit (or ::flush on failure)
//!                       ▼
//!                   Display::post_commit()
//!                          release / retire fences handed back or closed
//! ```
//!
//! **[`layer`]**: The per-frame [`LayerStack`](layer::LayerStack) and the
//! arena-backed [`LayerStackBuilder`](layer::LayerStackBuilder) that rebuilds
//! it in place every frame.
//!
//! **[`geometry`]**: Translation of window-system rectangles, transforms and
//! blend modes into the internal model.
//!
//! **[`cache`]**: The [`CompositionCache`](cache::CompositionCache) that
//! decides whether the GPU-composited target must be redrawn.
//!
//! **[`refresh`]**: Refresh-rate sanitizing and per-frame selection.
//!
//! **[`fence`]**: Move-only [`Fence`](fence::Fence) handles and the
//! ownership protocol that hands them between caller, core and engine.
//!
//! **[`virtual_output`]**: Output-buffer binding and dynamic resolution
//! change detection for off-screen displays.
//!
//! **[`display`]**: The per-display state machine tying it all together.
//!
//! **[`engine`]** / **[`buffer`]**: Contracts for the opaque composition
//! engine and the buffer allocator.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! pipeline instrumentation, with a zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-layer
//!   composition events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod buffer;
pub mod cache;
pub mod config;
pub mod content;
pub mod display;
pub mod engine;
pub mod error;
pub mod fence;
pub mod format;
pub mod geometry;
pub mod layer;
pub mod output;
pub mod refresh;
pub mod time;
pub mod trace;
pub mod virtual_output;

#[cfg(test)]
pub(crate) mod testing;
