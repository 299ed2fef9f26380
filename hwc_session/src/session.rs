// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The session context.
//!
//! A [`Session`] is created once when the composer starts and owns every
//! display it drives. One lock guards the set of connected displays; it is
//! taken by [`Session::prepare`] and held by the returned [`FrameGuard`] until
//! [`FrameGuard::commit`] has run, so a hot-plug never lands between the two
//! halves of a frame.

use std::sync::Arc;

use hwc_core::buffer::BufferAllocator;
use hwc_core::config::DisplayConfig;
use hwc_core::content::ContentList;
use hwc_core::display::{Display, DisplayCommand, DisplayKind, DisplayStatus};
use hwc_core::engine::{DisplayEngine, PowerMode};
use hwc_core::output::DisplayId;
use hwc_core::time::HostTime;
use hwc_core::trace::{HotplugAppliedEvent, PhaseBeginEvent, PhaseEndEvent, PhaseKind, Tracer};
use parking_lot::{Mutex, MutexGuard};

use crate::error::SessionError;
use crate::hotplug::{EventSource, HotplugEvent, HotplugShared, HotplugWatcher};
use crate::time;

/// One optional content list per display slot, indexed by [`DisplayId::slot`].
pub type FrameContents = [Option<ContentList>; DisplayId::COUNT];

/// Creates the engine behind each display the session connects.
pub trait EngineFactory {
    /// Engine type driving every display of this session.
    type Engine: DisplayEngine;

    /// Opens the engine for a newly connected display.
    fn create(&mut self, id: DisplayId, kind: DisplayKind) -> Result<Self::Engine, SessionError>;

    /// Allocator the display uses for buffers of its own, if any.
    fn allocator(&mut self, id: DisplayId) -> Option<Box<dyn BufferAllocator + Send>> {
        _ = id;
        None
    }
}

/// Notifications the session forwards to the window system.
///
/// Every method has a no-op default. Implementations are called from the
/// hot-plug watcher thread as well as from the caller's thread.
pub trait SessionCallbacks: Send + Sync {
    /// A vsync occurred on `display`.
    fn vsync(&self, display: DisplayId, timestamp: HostTime) {
        _ = (display, timestamp);
    }

    /// The window system should produce a new frame for `display`.
    fn refresh(&self, display: DisplayId) {
        _ = display;
    }

    /// A display was connected or disconnected.
    fn hotplug(&self, display: DisplayId, connected: bool) {
        _ = (display, connected);
    }
}

/// Callbacks that ignore everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCallbacks;

impl SessionCallbacks for NoCallbacks {}

/// Session-wide configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Configuration of the built-in panel.
    pub primary: DisplayConfig,
    /// Configuration applied to a hot-plugged external display.
    pub external: DisplayConfig,
    /// Configuration applied to a virtual display.
    pub virtual_display: DisplayConfig,
    /// Hot-plug events kept while no frame drains them.
    pub hotplug_queue_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            primary: DisplayConfig::primary(),
            external: DisplayConfig::external(),
            virtual_display: DisplayConfig::virtual_display(),
            hotplug_queue_depth: 8,
        }
    }
}

impl SessionConfig {
    fn for_display(&self, id: DisplayId) -> Result<DisplayConfig, SessionError> {
        match id {
            DisplayId::PRIMARY => Ok(self.primary),
            DisplayId::EXTERNAL => Ok(self.external),
            DisplayId::VIRTUAL => Ok(self.virtual_display),
            other => Err(SessionError::NoSuchDisplay(other)),
        }
    }
}

struct SessionState<F: EngineFactory> {
    factory: F,
    displays: [Option<Display<F::Engine>>; DisplayId::COUNT],
}

impl<F: EngineFactory> SessionState<F> {
    fn display_mut(&mut self, id: DisplayId) -> Result<&mut Display<F::Engine>, SessionError> {
        id.slot()
            .and_then(|slot| self.displays[slot].as_mut())
            .ok_or(SessionError::NoSuchDisplay(id))
    }

    fn connect(&mut self, id: DisplayId, config: DisplayConfig) -> Result<(), SessionError> {
        let slot = id.slot().ok_or(SessionError::NoSuchDisplay(id))?;
        if self.displays[slot].is_some() {
            return Err(SessionError::AlreadyConnected(id));
        }
        let engine = self.factory.create(id, config.kind)?;
        let mut display = Display::new(id, config, engine)?;
        if let Some(allocator) = self.factory.allocator(id) {
            display = display.with_allocator(allocator);
        }
        self.displays[slot] = Some(display);
        Ok(())
    }

    fn disconnect(&mut self, id: DisplayId) -> Result<(), SessionError> {
        let slot = id.slot().ok_or(SessionError::NoSuchDisplay(id))?;
        self.displays[slot]
            .take()
            .map(drop)
            .ok_or(SessionError::NoSuchDisplay(id))
    }
}

/// Owns the connected displays and serializes frames against hot-plug.
pub struct Session<F: EngineFactory> {
    config: SessionConfig,
    state: Mutex<SessionState<F>>,
    hotplug: Arc<HotplugShared>,
    callbacks: Arc<dyn SessionCallbacks>,
    watcher: Option<HotplugWatcher>,
}

impl<F: EngineFactory> core::fmt::Debug for Session<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

impl<F: EngineFactory> Session<F> {
    /// Starts a session and connects the primary display.
    pub fn new(
        config: SessionConfig,
        factory: F,
        callbacks: Arc<dyn SessionCallbacks>,
    ) -> Result<Self, SessionError> {
        let mut state = SessionState {
            factory,
            displays: [const { None }; DisplayId::COUNT],
        };
        state.connect(DisplayId::PRIMARY, config.primary)?;
        Ok(Self {
            config,
            state: Mutex::new(state),
            hotplug: Arc::new(HotplugShared::new(config.hotplug_queue_depth)),
            callbacks,
            watcher: None,
        })
    }

    /// Starts a watcher thread reading hot-plug events from `source`,
    /// replacing any previous watcher.
    pub fn watch(&mut self, source: impl EventSource) -> Result<(), SessionError> {
        // Stop the old thread before the new one shares the queue.
        self.watcher = None;
        self.watcher = Some(HotplugWatcher::spawn(
            source,
            Arc::clone(&self.hotplug),
            Arc::clone(&self.callbacks),
        )?);
        Ok(())
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Queues a hot-plug event as if the watcher had seen it.
    pub fn notify_hotplug(&self, event: HotplugEvent) {
        self.hotplug.push(event);
        self.callbacks.refresh(DisplayId::PRIMARY);
    }

    /// Whether a hot-plug asked for a frame since the last call.
    pub fn take_refresh_request(&self) -> bool {
        self.hotplug.take_refresh_request()
    }

    /// Hot-plug events lost to a full queue.
    #[must_use]
    pub fn dropped_hotplug_events(&self) -> u64 {
        self.hotplug.evicted()
    }

    /// Whether `id` is connected.
    #[must_use]
    pub fn is_connected(&self, id: DisplayId) -> bool {
        id.slot()
            .is_some_and(|slot| self.state.lock().displays[slot].is_some())
    }

    /// Connects a display, typically the virtual one.
    pub fn connect(&self, id: DisplayId) -> Result<(), SessionError> {
        let config = self.config.for_display(id)?;
        self.state.lock().connect(id, config)
    }

    /// Tears a display down, freeing everything it holds.
    pub fn disconnect(&self, id: DisplayId) -> Result<(), SessionError> {
        self.state.lock().disconnect(id)
    }

    /// Runs `f` against a connected display.
    pub fn with_display<R>(
        &self,
        id: DisplayId,
        f: impl FnOnce(&mut Display<F::Engine>) -> R,
    ) -> Result<R, SessionError> {
        let mut state = self.state.lock();
        Ok(f(state.display_mut(id)?))
    }

    /// Applies a runtime command to a display.
    pub fn perform(&self, id: DisplayId, command: DisplayCommand) -> Result<(), SessionError> {
        Ok(self.state.lock().display_mut(id)?.perform(command)?)
    }

    /// Switches a display's power mode.
    pub fn set_power_mode(&self, id: DisplayId, mode: PowerMode) -> Result<(), SessionError> {
        Ok(self.state.lock().display_mut(id)?.set_power_mode(mode)?)
    }

    /// Engine vsync callback.
    pub fn on_vsync(&self, id: DisplayId, timestamp: HostTime) {
        self.callbacks.vsync(id, timestamp);
    }

    /// Engine refresh callback.
    pub fn on_refresh(&self, id: DisplayId) {
        self.callbacks.refresh(id);
    }

    /// Engine idle callback. Asks for a frame when the panel can slow down.
    pub fn on_idle(&self, id: DisplayId) {
        let wants_frame = self
            .state
            .lock()
            .display_mut(id)
            .is_ok_and(|d| d.on_idle_timeout());
        if wants_frame {
            self.callbacks.refresh(id);
        }
    }

    /// Locks the session, applies pending hot-plug events and prepares every
    /// connected display that has content.
    ///
    /// Per-display failures do not stop the other displays; they are
    /// collected on the guard and the failed display flushes on commit.
    pub fn prepare(
        &self,
        contents: &mut FrameContents,
        tracer: &mut Tracer<'_>,
    ) -> FrameGuard<'_, F> {
        let mut state = self.state.lock();
        let mut failures = Vec::new();

        for event in self.hotplug.drain() {
            let result = match event {
                HotplugEvent::Connected => state.connect(DisplayId::EXTERNAL, self.config.external),
                HotplugEvent::Disconnected => state.disconnect(DisplayId::EXTERNAL),
                HotplugEvent::PanelReset => state.display_mut(DisplayId::PRIMARY).and_then(|d| {
                    d.perform(DisplayCommand::SetDisplayStatus(DisplayStatus::Refresh))
                        .map_err(SessionError::from)
                }),
            };
            let (display, connected) = match event {
                HotplugEvent::Connected => (DisplayId::EXTERNAL, Some(true)),
                HotplugEvent::Disconnected => (DisplayId::EXTERNAL, Some(false)),
                HotplugEvent::PanelReset => (DisplayId::PRIMARY, None),
            };
            match (result, connected) {
                (Ok(()), Some(connected)) => {
                    tracer.hotplug_applied(&HotplugAppliedEvent { display, connected });
                    self.callbacks.hotplug(display, connected);
                }
                (Ok(()), None) => {}
                (Err(e), _) => failures.push((display, e)),
            }
        }

        for (display, content) in state.displays.iter_mut().zip(contents.iter_mut()) {
            let (Some(display), Some(content)) = (display.as_mut(), content.as_mut()) else {
                continue;
            };
            let id = display.id();
            trace_phase(tracer, id, display.frame_index() + 1, PhaseKind::Prepare, true);
            let result = display.prepare(content, tracer);
            trace_phase(tracer, id, display.frame_index(), PhaseKind::Prepare, false);
            if let Err(e) = result {
                failures.push((id, e.into()));
            }
        }

        FrameGuard { state, failures }
    }
}

fn trace_phase(
    tracer: &mut Tracer<'_>,
    display: DisplayId,
    frame_index: u64,
    phase: PhaseKind,
    begin: bool,
) {
    if !tracer.is_active() {
        return;
    }
    let timestamp = time::now();
    if begin {
        tracer.phase_begin(&PhaseBeginEvent {
            display,
            frame_index,
            phase,
            timestamp,
        });
    } else {
        tracer.phase_end(&PhaseEndEvent {
            display,
            frame_index,
            phase,
            timestamp,
        });
    }
}

/// The session lock, held between prepare and commit of one frame.
pub struct FrameGuard<'a, F: EngineFactory> {
    state: MutexGuard<'a, SessionState<F>>,
    failures: Vec<(DisplayId, SessionError)>,
}

impl<F: EngineFactory> core::fmt::Debug for FrameGuard<'_, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl<F: EngineFactory> FrameGuard<'_, F> {
    /// Failures collected so far this frame.
    #[must_use]
    pub fn failures(&self) -> &[(DisplayId, SessionError)] {
        &self.failures
    }

    /// A connected display, for inspecting prepared stacks.
    #[must_use]
    pub fn display(&self, id: DisplayId) -> Option<&Display<F::Engine>> {
        self.state.displays.get(id.slot()?)?.as_ref()
    }

    /// Commits every prepared display, hands fences back and releases the
    /// session lock. Returns every failure of the frame.
    pub fn commit(
        self,
        contents: &mut FrameContents,
        tracer: &mut Tracer<'_>,
    ) -> Vec<(DisplayId, SessionError)> {
        let Self {
            mut state,
            mut failures,
        } = self;
        for (display, content) in state.displays.iter_mut().zip(contents.iter_mut()) {
            let (Some(display), Some(content)) = (display.as_mut(), content.as_mut()) else {
                continue;
            };
            let id = display.id();
            let frame = display.frame_index();
            trace_phase(tracer, id, frame, PhaseKind::Commit, true);
            if let Err(e) = display.commit(content, tracer) {
                failures.push((id, e.into()));
            }
            trace_phase(tracer, id, frame, PhaseKind::Commit, false);
            trace_phase(tracer, id, frame, PhaseKind::PostCommit, true);
            display.post_commit(content, tracer);
            trace_phase(tracer, id, frame, PhaseKind::PostCommit, false);
        }
        failures
    }
}
