// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Session context for `hwc_core` displays.
//!
//! - [`Session`]: owns the connected displays behind one lock held for each
//!   prepare/commit pair
//! - [`hotplug`]: watcher thread turning connection events into refresh
//!   requests
//! - [`SyncFd`]: `OwnedFd`-backed sync fences
//! - [`now`]: the monotonic clock stamping pipeline phases

mod error;
pub mod hotplug;
mod queue;
mod session;
mod sync_fd;
mod time;

pub use error::SessionError;
pub use session::{
    EngineFactory, FrameContents, FrameGuard, NoCallbacks, Session, SessionCallbacks,
    SessionConfig,
};
pub use sync_fd::SyncFd;
pub use time::{now, timebase};
