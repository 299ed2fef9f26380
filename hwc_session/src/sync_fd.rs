// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! File-descriptor backed sync fences.
//!
//! A kernel sync file becomes readable once every fence it holds has
//! signalled, so waiting is a `poll` for `POLLIN`.

use std::os::fd::{AsRawFd, IntoRawFd, OwnedFd};

use hwc_core::fence::{Fence, FenceError, SyncFile};
use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::Errno;

use crate::time::timeout_from_millis;

/// An owned sync file descriptor.
#[derive(Debug)]
pub struct SyncFd(OwnedFd);

impl SyncFd {
    /// Takes ownership of a sync file descriptor.
    #[must_use]
    pub fn new(fd: OwnedFd) -> Self {
        Self(fd)
    }

    /// Wraps the descriptor in a core [`Fence`].
    #[must_use]
    pub fn into_fence(self) -> Fence {
        Fence::new(self)
    }
}

impl From<OwnedFd> for SyncFd {
    fn from(fd: OwnedFd) -> Self {
        Self(fd)
    }
}

impl SyncFile for SyncFd {
    fn raw_fd(&self) -> i32 {
        self.0.as_raw_fd()
    }

    fn wait(&self, timeout_ms: u32) -> Result<(), FenceError> {
        let timeout = timeout_from_millis(timeout_ms);
        let mut fds = [PollFd::new(&self.0, PollFlags::IN)];
        loop {
            match poll(&mut fds, Some(&timeout)) {
                Ok(0) => return Err(FenceError::Timeout),
                Ok(_) => {
                    let revents = fds[0].revents();
                    return if revents.intersects(PollFlags::ERR | PollFlags::NVAL) {
                        Err(FenceError::Invalid)
                    } else {
                        Ok(())
                    };
                }
                Err(Errno::INTR) => {}
                Err(_) => return Err(FenceError::Invalid),
            }
        }
    }

    fn into_raw_fd(self: Box<Self>) -> i32 {
        self.0.into_raw_fd()
    }
}
