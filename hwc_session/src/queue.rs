// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded event queue shared with the hot-plug watcher.

use std::collections::VecDeque;

/// FIFO that evicts its oldest entry when full.
///
/// The watcher thread pushes faster than frames drain only when the session
/// is stalled; in that case the newest transitions are the ones that matter.
#[derive(Debug, Clone)]
pub(crate) struct DropOldestQueue<T> {
    items: VecDeque<T>,
    depth: usize,
    evicted: u64,
}

impl<T> DropOldestQueue<T> {
    /// Creates a queue holding at most `depth` entries (at least one).
    pub(crate) fn new(depth: usize) -> Self {
        let depth = depth.max(1);
        Self {
            items: VecDeque::with_capacity(depth),
            depth,
            evicted: 0,
        }
    }

    /// Appends `item`. Returns `true` if an older entry was evicted.
    pub(crate) fn push(&mut self, item: T) -> bool {
        let full = self.items.len() == self.depth;
        if full {
            self.items.pop_front();
            self.evicted += 1;
        }
        self.items.push_back(item);
        full
    }

    /// Removes every queued entry, oldest first.
    pub(crate) fn take_all(&mut self) -> VecDeque<T> {
        std::mem::replace(&mut self.items, VecDeque::with_capacity(self.depth))
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Entries evicted since the queue was created.
    pub(crate) fn evicted(&self) -> u64 {
        self.evicted
    }
}
