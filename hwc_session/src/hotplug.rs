// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hot-plug observation.
//!
//! A dedicated watcher thread blocks on an [`EventSource`], queues what it
//! sees and asks the window system for a new frame. It never touches a
//! display: events are applied by the next
//! [`Session::prepare`](crate::Session::prepare) under the session lock.

use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use hwc_core::output::DisplayId;
use parking_lot::Mutex;
use rustix::event::{PollFd, PollFlags, poll};
use rustix::io::{Errno, read};

use crate::SessionCallbacks;
use crate::error::SessionError;
use crate::queue::DropOldestQueue;
use crate::time::timeout_from_millis;

/// How long the watcher blocks before checking whether it should stop.
const WATCH_INTERVAL_MS: u32 = 50;

/// A display-connection transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HotplugEvent {
    /// An external display was connected.
    Connected,
    /// The external display was disconnected.
    Disconnected,
    /// The primary panel was reset and must be redrawn.
    PanelReset,
}

/// Outcome of one [`EventSource::poll_event`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourcePoll {
    /// An event arrived.
    Ready(HotplugEvent),
    /// Nothing happened within the timeout.
    Idle,
    /// The source will never produce another event.
    Closed,
}

/// Where hot-plug events come from.
pub trait EventSource: Send + 'static {
    /// Waits up to `timeout_ms` for the next event.
    fn poll_event(&mut self, timeout_ms: u32) -> rustix::io::Result<SourcePoll>;
}

/// Reads one-byte event codes from a descriptor: `+` connected, `-`
/// disconnected, `!` panel reset. Other bytes are ignored; end of file
/// closes the source.
#[derive(Debug)]
pub struct FdEventSource {
    fd: OwnedFd,
}

impl FdEventSource {
    /// Reads events from `fd`.
    #[must_use]
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    fn decode(byte: u8) -> Option<HotplugEvent> {
        match byte {
            b'+' => Some(HotplugEvent::Connected),
            b'-' => Some(HotplugEvent::Disconnected),
            b'!' => Some(HotplugEvent::PanelReset),
            _ => None,
        }
    }
}

impl EventSource for FdEventSource {
    fn poll_event(&mut self, timeout_ms: u32) -> rustix::io::Result<SourcePoll> {
        let timeout = timeout_from_millis(timeout_ms);
        let mut fds = [PollFd::new(&self.fd, PollFlags::IN)];
        if poll(&mut fds, Some(&timeout))? == 0 {
            return Ok(SourcePoll::Idle);
        }
        let mut byte = [0_u8; 1];
        match read(&self.fd, &mut byte[..])? {
            0 => Ok(SourcePoll::Closed),
            _ => Ok(Self::decode(byte[0]).map_or(SourcePoll::Idle, SourcePoll::Ready)),
        }
    }
}

/// State shared between the watcher thread and the session.
#[derive(Debug)]
pub(crate) struct HotplugShared {
    queue: Mutex<DropOldestQueue<HotplugEvent>>,
    refresh_requested: AtomicBool,
    stop: AtomicBool,
}

impl HotplugShared {
    pub(crate) fn new(depth: usize) -> Self {
        Self {
            queue: Mutex::new(DropOldestQueue::new(depth)),
            refresh_requested: AtomicBool::new(false),
            stop: AtomicBool::new(false),
        }
    }

    pub(crate) fn push(&self, event: HotplugEvent) {
        self.queue.lock().push(event);
        self.refresh_requested.store(true, Ordering::Release);
    }

    pub(crate) fn drain(&self) -> Vec<HotplugEvent> {
        self.queue.lock().take_all().into()
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.queue.lock().evicted()
    }

    pub(crate) fn take_refresh_request(&self) -> bool {
        self.refresh_requested.swap(false, Ordering::AcqRel)
    }
}

/// Owns the watcher thread; dropping it stops and joins the thread.
#[derive(Debug)]
pub struct HotplugWatcher {
    shared: Arc<HotplugShared>,
    thread: Option<thread::JoinHandle<()>>,
}

impl HotplugWatcher {
    pub(crate) fn spawn(
        mut source: impl EventSource,
        shared: Arc<HotplugShared>,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self, SessionError> {
        let worker = Arc::clone(&shared);
        let thread = thread::Builder::new()
            .name("hwc-hotplug".to_owned())
            .spawn(move || {
                while !worker.stop.load(Ordering::Acquire) {
                    match source.poll_event(WATCH_INTERVAL_MS) {
                        Ok(SourcePoll::Ready(event)) => {
                            worker.push(event);
                            callbacks.refresh(DisplayId::PRIMARY);
                        }
                        Ok(SourcePoll::Idle) | Err(Errno::INTR) => {}
                        Ok(SourcePoll::Closed) | Err(_) => break,
                    }
                }
            })
            .map_err(|e| SessionError::Io(Errno::from_io_error(&e).unwrap_or(Errno::AGAIN)))?;
        Ok(Self {
            shared,
            thread: Some(thread),
        })
    }

    /// Whether the thread is still watching.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use rustix::io::write;
    use rustix::pipe::pipe;

    use super::*;

    #[derive(Debug, Default)]
    struct Refreshes(AtomicBool);

    impl SessionCallbacks for Refreshes {
        fn refresh(&self, display: DisplayId) {
            assert_eq!(display, DisplayId::PRIMARY, "hot-plug refreshes the primary");
            self.0.store(true, Ordering::Release);
        }
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn fd_source_decodes_codes_and_closes_on_eof() {
        let (reader, writer) = pipe().expect("pipe");
        let mut source = FdEventSource::new(reader);
        assert_eq!(source.poll_event(0), Ok(SourcePoll::Idle));

        write(&writer, b"+x!").expect("write");
        assert_eq!(
            source.poll_event(0),
            Ok(SourcePoll::Ready(HotplugEvent::Connected))
        );
        assert_eq!(source.poll_event(0), Ok(SourcePoll::Idle), "unknown byte");
        assert_eq!(
            source.poll_event(0),
            Ok(SourcePoll::Ready(HotplugEvent::PanelReset))
        );

        drop(writer);
        assert_eq!(source.poll_event(0), Ok(SourcePoll::Closed));
    }

    #[test]
    fn watcher_queues_events_and_requests_a_refresh() {
        let (reader, writer) = pipe().expect("pipe");
        let shared = Arc::new(HotplugShared::new(4));
        let callbacks = Arc::new(Refreshes::default());
        let watcher = HotplugWatcher::spawn(
            FdEventSource::new(reader),
            Arc::clone(&shared),
            Arc::clone(&callbacks) as Arc<dyn SessionCallbacks>,
        )
        .expect("spawn");
        assert!(watcher.is_running());

        write(&writer, b"+-").expect("write");
        let mut seen = Vec::new();
        assert!(
            wait_for(|| {
                seen.extend(shared.drain());
                seen.len() == 2
            }),
            "watcher delivered both events"
        );
        assert_eq!(seen, [HotplugEvent::Connected, HotplugEvent::Disconnected]);
        assert!(shared.take_refresh_request());
        assert!(!shared.take_refresh_request(), "request is consumed");
        assert!(callbacks.0.load(Ordering::Acquire));

        drop(writer);
        assert!(wait_for(|| !watcher.is_running()), "eof stops the watcher");
    }

    #[test]
    fn dropping_the_watcher_joins_an_idle_thread() {
        let (reader, _writer) = pipe().expect("pipe");
        let shared = Arc::new(HotplugShared::new(1));
        let watcher = HotplugWatcher::spawn(
            FdEventSource::new(reader),
            Arc::clone(&shared),
            Arc::new(Refreshes::default()),
        )
        .expect("spawn");
        drop(watcher);
        assert_eq!(Arc::strong_count(&shared), 1, "thread released its handle");
    }

    #[test]
    fn full_queue_evicts_the_oldest_event() {
        let shared = HotplugShared::new(2);
        shared.push(HotplugEvent::Connected);
        shared.push(HotplugEvent::Disconnected);
        shared.push(HotplugEvent::Connected);
        assert_eq!(shared.evicted(), 1);
        assert_eq!(
            shared.drain(),
            [HotplugEvent::Disconnected, HotplugEvent::Connected]
        );
    }
}
