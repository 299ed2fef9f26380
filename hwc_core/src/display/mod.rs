// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-display state machine.
//!
//! A [`Display`] owns everything one display needs across frames: the
//! composition engine, the layer-stack arena, the composition cache, the
//! refresh-rate selector and the per-kind strategy state (output dumps on the
//! primary panel, scan adjustment on external displays, output binding on
//! virtual ones).
//!
//! Each frame runs [`prepare`](Display::prepare),
//! [`commit`](Display::commit) and [`post_commit`](Display::post_commit) in
//! that order with the same [`ContentList`]. A frame that cannot be shown is
//! *flushed*: the engine drops it, the previous frame stays on screen, and
//! every fence of the abandoned frame is closed so that producers are never
//! left waiting.
//!
//! Once the engine reports [`EngineError::ShutDown`] the display is latched:
//! every later call succeeds without touching the engine.

mod command;
mod dump;
mod kind;

use alloc::boxed::Box;
use core::fmt;

pub use command::{DisplayCommand, DisplayStatus};
pub use kind::DisplayKind;

use self::dump::{DUMP_WAIT_MS, FrameDump};
use self::kind::KindState;
use crate::buffer::BufferAllocator;
use crate::cache::CompositionCache;
use crate::config::DisplayConfig;
use crate::content::{ClientComposition, ContentList};
use crate::engine::{DisplayAttributes, DisplayEngine, EngineError, PowerMode};
use crate::error::DisplayError;
use crate::fence::FenceLifecycle;
use crate::layer::{
    Composition, LayerFlags, LayerStack, LayerStackBuilder, PopulateParams, PopulateSummary,
    RectCounts, StackFlags,
};
use crate::output::DisplayId;
use crate::refresh::RefreshRateSelector;
use crate::trace::{
    EngineFaultEvent, EngineOp, FlushReason, FrameCommittedEvent, FrameFlushedEvent,
    FramePreparedEvent, OutputDumpedEvent, OutputReconfiguredEvent, RefreshRateChangedEvent,
    Tracer,
};

/// Maps an engine composition to what the window system must do.
///
/// GPU layers are reported as device-composed when the GPU target does not
/// need redrawing: the window system then leaves them alone.
#[must_use]
pub fn client_composition(composition: Composition, needs_refresh: bool) -> ClientComposition {
    match composition {
        Composition::Gpu if needs_refresh => ClientComposition::Client,
        Composition::Gpu
        | Composition::Hardware
        | Composition::Hybrid
        | Composition::Blit
        | Composition::BlitTarget
        | Composition::Cursor => ClientComposition::Device,
        Composition::HwCursor => ClientComposition::Cursor,
        Composition::GpuTarget => ClientComposition::Target,
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct FrameState {
    index: u64,
    flush: Option<FlushReason>,
}

/// One display driven through its composition engine.
pub struct Display<E> {
    id: DisplayId,
    config: DisplayConfig,
    engine: E,
    allocator: Option<Box<dyn BufferAllocator + Send>>,
    attributes: DisplayAttributes,
    builder: LayerStackBuilder,
    cache: CompositionCache,
    refresh: RefreshRateSelector,
    fences: FenceLifecycle,
    kind: KindState,
    power_mode: PowerMode,
    paused: bool,
    shut_down: bool,
    full_refresh_pending: bool,
    frame: FrameState,
}

impl<E> fmt::Debug for Display<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display")
            .field("id", &self.id)
            .field("kind", &self.config.kind)
            .field("power_mode", &self.power_mode)
            .field("paused", &self.paused)
            .field("shut_down", &self.shut_down)
            .field("frame_index", &self.frame.index)
            .finish_non_exhaustive()
    }
}

impl<E: DisplayEngine> Display<E> {
    /// Creates a display and pushes the configured idle timeout to the
    /// engine.
    pub fn new(id: DisplayId, config: DisplayConfig, mut engine: E) -> Result<Self, DisplayError> {
        let attributes = engine.attributes();
        if config.idle_timeout_ms > 0 {
            engine.set_idle_timeout(config.idle_timeout_ms)?;
        }
        Ok(Self {
            id,
            config,
            engine,
            allocator: None,
            attributes,
            builder: LayerStackBuilder::new(config.arena_step_bytes, config.blit_target_layers),
            cache: CompositionCache::new(config.max_layer_count),
            refresh: RefreshRateSelector::new(
                attributes.min_refresh_rate,
                attributes.max_refresh_rate,
                config.use_metadata_refresh_rate,
            ),
            fences: FenceLifecycle::new(config.swap_interval_zero),
            kind: KindState::new(config.kind, config.action_safe),
            power_mode: PowerMode::On,
            paused: false,
            shut_down: false,
            full_refresh_pending: false,
            frame: FrameState::default(),
        })
    }

    /// Gives the display an allocator for buffers of its own.
    #[must_use]
    pub fn with_allocator(mut self, allocator: Box<dyn BufferAllocator + Send>) -> Self {
        self.allocator = Some(allocator);
        self
    }

    /// The display's identity.
    #[must_use]
    pub fn id(&self) -> DisplayId {
        self.id
    }

    /// The display's kind.
    #[must_use]
    pub fn kind(&self) -> DisplayKind {
        self.config.kind
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Mutable access to the engine.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Attributes reported by the engine.
    #[must_use]
    pub fn attributes(&self) -> &DisplayAttributes {
        &self.attributes
    }

    /// The stack of the last prepared frame.
    #[must_use]
    pub fn stack(&self) -> &LayerStack {
        self.builder.stack()
    }

    /// The composition cache.
    #[must_use]
    pub fn cache(&self) -> &CompositionCache {
        &self.cache
    }

    /// Refresh rate the panel is running at.
    #[must_use]
    pub fn refresh_rate(&self) -> u32 {
        self.refresh.active()
    }

    /// Current power mode.
    #[must_use]
    pub fn power_mode(&self) -> PowerMode {
        self.power_mode
    }

    /// Whether the display is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the engine reported shutdown.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Frames prepared so far.
    #[must_use]
    pub fn frame_index(&self) -> u64 {
        self.frame.index
    }

    /// Why the current frame will be flushed, if it will.
    #[must_use]
    pub fn pending_flush(&self) -> Option<FlushReason> {
        self.frame.flush
    }

    /// Builds the layer stack for `content` and lets the engine assign
    /// compositions.
    ///
    /// On return every content layer's
    /// [`composition`](crate::content::ContentLayer::composition) holds the
    /// decision. Acquire fences stay with the caller until commit.
    ///
    /// Errors abort the frame: nothing reaches the engine and the following
    /// commit flushes.
    pub fn prepare(
        &mut self,
        content: &mut ContentList,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), DisplayError> {
        if self.shut_down {
            return Ok(());
        }
        self.frame.index += 1;
        self.frame.flush = None;

        if content.target_index().is_none() {
            self.frame.flush = Some(FlushReason::FrameError);
            return Err(DisplayError::InvalidParameters(
                "content list has no GPU target",
            ));
        }

        let early_flush = if content.layers.len() == 1 {
            Some(FlushReason::SingleLayer)
        } else if self.paused {
            Some(FlushReason::Paused)
        } else if self.power_mode == PowerMode::Off {
            Some(FlushReason::PowerOff)
        } else if self.config.kind == DisplayKind::Virtual && content.output.is_none() {
            Some(FlushReason::NoOutput)
        } else {
            None
        };
        if let Some(reason) = early_flush {
            if reason != FlushReason::SingleLayer {
                mark_gpu_bypass(content);
            }
            self.frame.flush = Some(reason);
            self.trace_prepared(tracer, content.layers.len(), false, false, None);
            return Ok(());
        }

        let summary = match self.build_stack(content, tracer) {
            Ok(summary) => summary,
            Err(e) => {
                self.frame.flush = Some(FlushReason::FrameError);
                return Err(e);
            }
        };

        let stack = self.builder.stack_mut();
        let one_layer_updating = self.cache.mark_updating(stack);
        let target_dirty = self.cache.structure_changed(stack)
            || stack
                .layers()
                .iter()
                .any(|l| l.flags.contains(LayerFlags::UPDATING));
        if let Some(t) = stack.gpu_target_index() {
            stack.layers_mut()[t]
                .flags
                .set(LayerFlags::UPDATING, target_dirty);
        }

        if let Err(error) = self.engine.prepare(self.builder.stack_mut()) {
            match error {
                EngineError::ShutDown => self.shut_down = true,
                EngineError::Permission => {
                    mark_gpu_bypass(content);
                    self.frame.flush = Some(FlushReason::EngineError);
                }
                error => {
                    self.trace_fault(tracer, EngineOp::Prepare, error);
                    mark_gpu_bypass(content);
                    self.frame.flush = Some(FlushReason::EngineError);
                }
            }
            return Ok(());
        }

        let stack = self.builder.stack();
        let needs_refresh = self.cache.needs_refresh(stack);
        for (src, layer) in content.layers.iter_mut().zip(stack.layers()) {
            src.composition = client_composition(layer.composition, needs_refresh);
        }
        #[cfg(feature = "trace-rich")]
        if tracer.is_active() {
            let records: alloc::vec::Vec<_> = stack
                .layers()
                .iter()
                .enumerate()
                .map(|(i, l)| crate::trace::CompositionRecord {
                    layer_index: u32::try_from(i).unwrap_or(u32::MAX),
                    composition: l.composition,
                    updating: l.flags.contains(LayerFlags::UPDATING),
                })
                .collect();
            tracer.compositions(self.id, self.frame.index, &records);
        }
        self.cache.update(stack);
        self.full_refresh_pending = false;

        self.apply_refresh_rate(tracer, one_layer_updating, summary.metadata_refresh_rate);
        self.trace_prepared(
            tracer,
            summary.layer_count,
            needs_refresh,
            one_layer_updating,
            summary.metadata_refresh_rate,
        );
        Ok(())
    }

    fn build_stack(
        &mut self,
        content: &ContentList,
        tracer: &mut Tracer<'_>,
    ) -> Result<PopulateSummary, DisplayError> {
        let blit = self.builder.blit_rects_per_layer();
        self.builder.allocate(
            content.layers.len(),
            content.layers.iter().map(|l| RectCounts::of(l, blit)),
        )?;
        let params = PopulateParams {
            refresh: &self.refresh,
            scan: self.kind.scan_adjustment(&self.attributes),
        };
        let summary = self.builder.populate(content, &params)?;

        let stack = self.builder.stack_mut();
        if self.full_refresh_pending {
            stack.flags |= StackFlags::GEOMETRY_CHANGED;
        }
        match &mut self.kind {
            KindState::Virtual { binder } => {
                if let Some(handle) = &content.output {
                    let (buffer, reconfig) = binder.bind(handle, &mut self.engine)?;
                    stack.output_buffer = Some(buffer);
                    if let Some(r) = reconfig {
                        tracer.output_reconfigured(&OutputReconfiguredEvent {
                            display: self.id,
                            previous: r.previous,
                            current: r.current,
                        });
                    }
                }
            }
            KindState::Primary { dump } => stack.output_buffer = dump.output_buffer(),
            KindState::External { .. } => {}
        }
        Ok(summary)
    }

    fn apply_refresh_rate(
        &mut self,
        tracer: &mut Tracer<'_>,
        one_layer_updating: bool,
        metadata_rate: Option<u32>,
    ) {
        let Some(rate) = self.refresh.next_change(one_layer_updating, metadata_rate) else {
            return;
        };
        match self.engine.set_refresh_rate(rate) {
            Ok(()) => {
                let from = self.refresh.active();
                self.refresh.set_active(rate);
                tracer.refresh_rate_changed(&RefreshRateChangedEvent {
                    display: self.id,
                    from,
                    to: rate,
                });
            }
            Err(error) => self.trace_fault(tracer, EngineOp::SetRefreshRate, error),
        }
    }

    /// Hands the prepared stack to the engine, or flushes the frame.
    ///
    /// Acquire fences move from `content` to the engine for the duration of
    /// the call and are closed once it returns.
    pub fn commit(
        &mut self,
        content: &mut ContentList,
        tracer: &mut Tracer<'_>,
    ) -> Result<(), DisplayError> {
        if self.shut_down {
            return Ok(());
        }
        if let Some(reason) = self.frame.flush {
            self.flush_frame(content, reason, tracer);
            return Ok(());
        }

        let stack = self.builder.stack_mut();
        self.fences.attach_acquire_fences(content, stack);
        let result = self.engine.commit(stack);
        self.fences.close_acquire_fences(stack);

        match result {
            Ok(()) | Err(EngineError::Permission) => {}
            Err(EngineError::ShutDown) => self.shut_down = true,
            Err(error) => {
                self.trace_fault(tracer, EngineOp::Commit, error);
                self.flush_frame(content, FlushReason::EngineError, tracer);
            }
        }
        Ok(())
    }

    fn flush_frame(
        &mut self,
        content: &mut ContentList,
        reason: FlushReason,
        tracer: &mut Tracer<'_>,
    ) {
        match self.engine.flush() {
            Ok(()) => {}
            Err(EngineError::ShutDown) => self.shut_down = true,
            Err(error) => self.trace_fault(tracer, EngineOp::Flush, error),
        }
        self.fences.flush(content, self.builder.stack_mut());
        self.frame.flush = Some(reason);
        tracer.frame_flushed(&FrameFlushedEvent {
            display: self.id,
            frame_index: self.frame.index,
            reason,
        });
    }

    /// Hands release and retire fences back to the window system and closes
    /// everything else the frame still holds.
    pub fn post_commit(&mut self, content: &mut ContentList, tracer: &mut Tracer<'_>) {
        if self.shut_down {
            return;
        }
        if self.frame.flush.is_some() {
            content.close_acquire_fences();
            return;
        }

        let stack = self.builder.stack_mut();

        if let KindState::Primary { dump } = &mut self.kind {
            if dump.is_active() {
                let signalled = stack
                    .output_buffer()
                    .and_then(|b| b.release_fence.as_ref())
                    .is_none_or(|f| f.wait(DUMP_WAIT_MS).is_ok());
                let allocator = self
                    .allocator
                    .as_deref_mut()
                    .map(|a| a as &mut dyn BufferAllocator);
                let remaining = dump.frame_done(allocator);
                tracer.output_dumped(&OutputDumpedEvent {
                    display: self.id,
                    frame_index: self.frame.index,
                    signalled,
                    remaining,
                });
            }
        }

        let out = self.fences.post_commit(stack, content);
        tracer.frame_committed(&FrameCommittedEvent {
            display: self.id,
            frame_index: self.frame.index,
            released_fences: out.released,
            closed_fences: out.closed,
            retire_fence: out.retire,
        });
    }

    /// Switches the power mode.
    ///
    /// Turning a display back on from off redraws everything on the next
    /// frame.
    pub fn set_power_mode(&mut self, mode: PowerMode) -> Result<(), DisplayError> {
        if self.shut_down {
            return Ok(());
        }
        match self.engine.set_power_mode(mode) {
            Ok(()) => {}
            Err(EngineError::ShutDown) => {
                self.shut_down = true;
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        }
        if self.power_mode == PowerMode::Off && mode != PowerMode::Off {
            self.full_refresh_pending = true;
        }
        self.power_mode = mode;
        Ok(())
    }

    /// Records an idle timeout reported by the engine.
    ///
    /// Returns whether the window system should be asked for a new frame, so
    /// that the panel can drop to its lowest refresh rate.
    pub fn on_idle_timeout(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        self.refresh.on_idle();
        self.refresh.forced().is_none() && self.refresh.active() != self.refresh.min()
    }

    /// Applies a runtime command.
    pub fn perform(&mut self, command: DisplayCommand) -> Result<(), DisplayError> {
        if self.shut_down {
            return Ok(());
        }
        match command {
            DisplayCommand::SetForcedRefreshRate(rate) => {
                self.refresh.set_forced(rate)?;
                if rate != 0 && rate != self.refresh.active() {
                    self.engine.set_refresh_rate(rate)?;
                    self.refresh.set_active(rate);
                }
            }
            DisplayCommand::SetIdleTimeout(timeout_ms) => {
                self.engine.set_idle_timeout(timeout_ms)?;
                self.config.idle_timeout_ms = timeout_ms;
            }
            DisplayCommand::SetMetadataRefreshRate(enabled) => {
                self.refresh.set_use_metadata(enabled);
                self.config.use_metadata_refresh_rate = enabled;
            }
            DisplayCommand::SetSwapIntervalZero(enabled) => {
                self.fences.swap_interval_zero = enabled;
                self.config.swap_interval_zero = enabled;
            }
            DisplayCommand::SetDisplayStatus(status) => match status {
                DisplayStatus::Pause => self.paused = true,
                DisplayStatus::Resume => {
                    self.paused = false;
                    self.full_refresh_pending = true;
                }
                DisplayStatus::Refresh => self.full_refresh_pending = true,
            },
            DisplayCommand::SetActiveConfig(index) => {
                self.engine.set_active_config(index)?;
                self.attributes = self.engine.attributes();
                self.refresh = RefreshRateSelector::new(
                    self.attributes.min_refresh_rate,
                    self.attributes.max_refresh_rate,
                    self.config.use_metadata_refresh_rate,
                );
                self.full_refresh_pending = true;
            }
            DisplayCommand::SetFrameDumpConfig { frames, output } => {
                let KindState::Primary { dump } = &mut self.kind else {
                    return Err(DisplayError::InvalidParameters(
                        "frame dumps are only supported on the primary display",
                    ));
                };
                let allocator = self
                    .allocator
                    .as_deref_mut()
                    .map(|a| a as &mut dyn BufferAllocator);
                dump.configure(
                    frames,
                    output,
                    allocator,
                    self.attributes.width,
                    self.attributes.height,
                )?;
            }
            DisplayCommand::SetActionSafe(action_safe) => {
                let KindState::External { action_safe: slot } = &mut self.kind else {
                    return Err(DisplayError::InvalidParameters(
                        "action safe applies to external displays",
                    ));
                };
                if action_safe.is_some_and(|a| !a.is_valid()) {
                    return Err(DisplayError::InvalidParameters(
                        "action safe percentage above 100",
                    ));
                }
                *slot = action_safe;
                self.config.action_safe = action_safe;
                self.full_refresh_pending = true;
            }
            DisplayCommand::SetMaxMixerStages(stages) => {
                self.engine.set_max_mixer_stages(stages)?;
            }
        }
        Ok(())
    }

    fn trace_prepared(
        &self,
        tracer: &mut Tracer<'_>,
        layer_count: usize,
        needs_refresh: bool,
        one_layer_updating: bool,
        metadata_refresh_rate: Option<u32>,
    ) {
        tracer.frame_prepared(&FramePreparedEvent {
            display: self.id,
            frame_index: self.frame.index,
            layer_count,
            flush: self.frame.flush.is_some(),
            needs_refresh,
            one_layer_updating,
            metadata_refresh_rate,
        });
    }

    fn trace_fault(&self, tracer: &mut Tracer<'_>, op: EngineOp, error: EngineError) {
        tracer.engine_fault(&EngineFaultEvent {
            display: self.id,
            frame_index: self.frame.index,
            op,
            error,
        });
    }
}

impl<E> Drop for Display<E> {
    fn drop(&mut self) {
        if let KindState::Primary { dump } = &mut self.kind {
            let allocator = self
                .allocator
                .as_deref_mut()
                .map(|a| a as &mut dyn BufferAllocator);
            dump.release(allocator);
        }
    }
}

/// Tells the window system not to composite anything for a frame that will
/// not be shown.
fn mark_gpu_bypass(content: &mut ContentList) {
    for layer in &mut content.layers {
        if !layer.is_target() {
            layer.composition = ClientComposition::Device;
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::vec;
    use alloc::vec::Vec;

    use kurbo::Rect;

    use super::*;
    use crate::content::{BufferHandle, BufferId, ContentLayer, ContentListFlags};
    use crate::format::HalFormat;
    use crate::geometry::ActionSafe;
    use crate::testing::{CountingFences, FakeAllocator, FakeEngine, XorShift};

    const TARGET_ID: u64 = 0xFFFF;

    fn handle(id: u64) -> BufferHandle {
        BufferHandle::new(BufferId(id), 64, 64, HalFormat::RGBA_8888)
    }

    /// One layer per id plus the GPU target, every layer fenced.
    fn frame(ids: &[u64], fences: &CountingFences) -> ContentList {
        let mut layers: Vec<_> = ids
            .iter()
            .map(|&id| ContentLayer::new(handle(id)).with_acquire_fence(fences.fence()))
            .collect();
        layers.push(ContentLayer::gpu_target(handle(TARGET_ID)).with_acquire_fence(fences.fence()));
        ContentList::new(layers)
    }

    fn display(config: DisplayConfig) -> Display<FakeEngine> {
        Display::new(DisplayId::PRIMARY, config, FakeEngine::new(64, 64)).expect("display")
    }

    fn run(d: &mut Display<FakeEngine>, content: &mut ContentList) {
        let mut tracer = Tracer::none();
        d.prepare(content, &mut tracer).expect("prepare");
        d.commit(content, &mut tracer).expect("commit");
        d.post_commit(content, &mut tracer);
    }

    #[test]
    fn single_layer_frame_is_flushed_without_touching_the_engine() {
        let mut d = display(DisplayConfig::primary());
        let fences = d.engine().fences.clone();
        let mut content = frame(&[], &fences);

        run(&mut d, &mut content);

        assert_eq!(d.pending_flush(), Some(FlushReason::SingleLayer));
        assert_eq!(d.engine().prepare_calls, 0);
        assert_eq!(d.engine().commit_calls, 0);
        assert_eq!(d.engine().flush_calls, 1);
        assert_eq!(fences.open(), 0, "target acquire fence closed");
    }

    #[test]
    fn unchanged_gpu_layer_reuses_the_target() {
        let mut d = display(DisplayConfig::primary());
        d.engine_mut().gpu_layers = vec![1];
        let fences = d.engine().fences.clone();

        let mut first = frame(&[1, 2], &fences);
        run(&mut d, &mut first);
        assert_eq!(first.layers[1].composition, ClientComposition::Client);

        let mut changed = frame(&[1, 3], &fences);
        run(&mut d, &mut changed);
        assert_eq!(
            changed.layers[1].composition,
            ClientComposition::Client,
            "new buffer on a GPU layer redraws the target"
        );
        assert_eq!(changed.layers[0].composition, ClientComposition::Device);

        let mut same = frame(&[1, 3], &fences);
        run(&mut d, &mut same);
        assert_eq!(
            same.layers[1].composition,
            ClientComposition::Device,
            "cached target is reused"
        );
        assert_eq!(same.layers[2].composition, ClientComposition::Target);
    }

    #[test]
    fn metadata_rate_drops_the_panel_to_a_multiple() {
        let attrs = DisplayAttributes {
            min_refresh_rate: 48,
            ..DisplayAttributes::fixed(64, 64, 60)
        };
        let mut d = Display::new(
            DisplayId::PRIMARY,
            DisplayConfig::primary(),
            FakeEngine::with_attributes(attrs),
        )
        .expect("display");
        let fences = d.engine().fences.clone();

        let mut video = frame(&[7], &fences);
        video.layers[0].handle.as_mut().expect("handle").frame_rate = Some(24);
        run(&mut d, &mut video);
        assert_eq!(d.refresh_rate(), 48, "24 Hz content runs at 48 Hz");
        assert_eq!(d.engine().refresh_rates, vec![48]);

        let mut busy = frame(&[8, 9], &fences);
        run(&mut d, &mut busy);
        assert_eq!(d.refresh_rate(), 60, "two updating layers need the max");
        assert_eq!(d.engine().refresh_rates, vec![48, 60]);
    }

    #[test]
    fn idle_timeout_selects_the_minimum_once() {
        let attrs = DisplayAttributes {
            min_refresh_rate: 30,
            ..DisplayAttributes::fixed(64, 64, 60)
        };
        let mut d = Display::new(
            DisplayId::PRIMARY,
            DisplayConfig::primary(),
            FakeEngine::with_attributes(attrs),
        )
        .expect("display");
        let fences = d.engine().fences.clone();

        assert!(d.on_idle_timeout(), "a lower rate is available");
        run(&mut d, &mut frame(&[1, 2], &fences));
        assert_eq!(d.refresh_rate(), 30);
        run(&mut d, &mut frame(&[3, 4], &fences));
        assert_eq!(d.refresh_rate(), 60, "idle latch is consumed");
    }

    #[test]
    fn virtual_output_resize_reconfigures_before_prepare() {
        let mut d = Display::new(
            DisplayId::VIRTUAL,
            DisplayConfig::virtual_display(),
            FakeEngine::new(1920, 1080),
        )
        .expect("display");
        let fences = d.engine().fences.clone();

        let mut content = frame(&[1], &fences);
        content.output = Some(BufferHandle::new(
            BufferId(0x77),
            1920,
            1080,
            HalFormat::RGBA_8888,
        ));
        run(&mut d, &mut content);

        let mut content = frame(&[1], &fences);
        content.output = Some(BufferHandle::new(
            BufferId(0x78),
            1280,
            720,
            HalFormat::RGBA_8888,
        ));
        run(&mut d, &mut content);

        let engine = d.engine();
        assert_eq!(engine.output_configs.len(), 2);
        assert_eq!(
            (engine.output_configs[1].width, engine.output_configs[1].height),
            (1280, 720)
        );
        assert_eq!(
            engine.events,
            vec![
                "set_output_config",
                "prepare",
                "commit",
                "set_output_config",
                "prepare",
                "commit"
            ]
        );
        assert_eq!(engine.output_seen, 2);
    }

    #[test]
    fn virtual_frame_without_output_is_flushed() {
        let mut d = Display::new(
            DisplayId::VIRTUAL,
            DisplayConfig::virtual_display(),
            FakeEngine::new(64, 64),
        )
        .expect("display");
        let fences = d.engine().fences.clone();
        let mut content = frame(&[1], &fences);
        run(&mut d, &mut content);
        assert_eq!(d.pending_flush(), Some(FlushReason::NoOutput));
        assert_eq!(content.layers[0].composition, ClientComposition::Device);
        assert_eq!(fences.open(), 0);
    }

    #[test]
    fn shutdown_latches_every_entry_point() {
        let mut d = display(DisplayConfig::primary());
        d.engine_mut().prepare_error = Some(EngineError::ShutDown);
        let fences = d.engine().fences.clone();

        run(&mut d, &mut frame(&[1], &fences));
        assert!(d.is_shut_down());

        run(&mut d, &mut frame(&[1], &fences));
        assert_eq!(d.set_power_mode(PowerMode::Off), Ok(()));
        assert_eq!(d.perform(DisplayCommand::SetMaxMixerStages(2)), Ok(()));
        assert!(!d.on_idle_timeout());

        let engine = d.engine();
        assert_eq!(engine.prepare_calls, 1, "engine untouched after shutdown");
        assert_eq!(engine.commit_calls, 0);
        assert_eq!(engine.flush_calls, 0);
        assert!(engine.power_modes.is_empty());
        assert!(engine.mixer_stages.is_empty());
    }

    #[test]
    fn only_non_gpu_release_fences_survive_a_frame() {
        let mut rng = XorShift::new(0x5eed);
        let mut d = display(DisplayConfig::primary());
        let fences = d.engine().fences.clone();

        for _ in 0..64 {
            let count = 1 + rng.below(6) as usize;
            let ids: Vec<u64> = (0..count).map(|_| u64::from(rng.below(4))).collect();
            let gpu: Vec<usize> = (0..count).filter(|_| rng.below(2) == 0).collect();
            d.engine_mut().gpu_layers = gpu.clone();

            let mut content = frame(&ids, &fences);
            run(&mut d, &mut content);

            let handed_back = content
                .layers
                .iter()
                .filter(|l| l.release_fence.is_some())
                .count();
            // Every source layer the engine did not give to the GPU, plus the
            // target.
            assert_eq!(handed_back, count - gpu.len() + 1);
            assert!(content.retire_fence.is_some());
            assert_eq!(fences.open(), handed_back + 1, "everything else closed");

            drop(content);
            assert_eq!(fences.open(), 0);
        }
    }

    #[test]
    fn animating_frames_hand_back_the_redrawn_target_fence() {
        let mut d = display(DisplayConfig::primary());
        d.engine_mut().gpu_layers = vec![1];
        let fences = d.engine().fences.clone();

        for index in 0..3 {
            let mut content = frame(&[1, 2], &fences);
            content.flags |= ContentListFlags::ANIMATING;
            run(&mut d, &mut content);

            assert_eq!(
                content.layers[1].composition,
                ClientComposition::Client,
                "frame {index}: animation redraws the target"
            );
            assert!(
                content.layers[2].release_fence.is_some(),
                "frame {index}: target release fence handed back"
            );
            assert!(content.layers[1].release_fence.is_none());
        }
    }

    #[test]
    fn swap_interval_zero_closes_every_fence() {
        let mut d = display(DisplayConfig::primary());
        d.perform(DisplayCommand::SetSwapIntervalZero(true))
            .expect("perform");
        let fences = d.engine().fences.clone();

        let mut content = frame(&[1, 2], &fences);
        run(&mut d, &mut content);

        assert_eq!(d.engine().acquire_fences_seen, 0, "engine saw no acquire fence");
        assert!(content.layers.iter().all(|l| l.release_fence.is_none()));
        assert!(content.retire_fence.is_none());
        assert_eq!(fences.open(), 0);
    }

    #[test]
    fn pause_bypasses_the_gpu_and_resume_redraws() {
        let mut d = display(DisplayConfig::primary());
        let fences = d.engine().fences.clone();
        d.perform(DisplayCommand::SetDisplayStatus(DisplayStatus::Pause))
            .expect("pause");

        let mut content = frame(&[1, 2], &fences);
        run(&mut d, &mut content);
        assert_eq!(d.pending_flush(), Some(FlushReason::Paused));
        assert!(
            content.layers[..2]
                .iter()
                .all(|l| l.composition == ClientComposition::Device)
        );
        assert_eq!(d.engine().flush_calls, 1);
        assert_eq!(fences.open(), 0);

        d.perform(DisplayCommand::SetDisplayStatus(DisplayStatus::Resume))
            .expect("resume");
        run(&mut d, &mut frame(&[1, 2], &fences));
        assert!(d.stack().flags().contains(StackFlags::GEOMETRY_CHANGED));

        run(&mut d, &mut frame(&[1, 2], &fences));
        assert!(
            !d.stack().flags().contains(StackFlags::GEOMETRY_CHANGED),
            "full refresh requested once"
        );
    }

    #[test]
    fn power_off_flushes_until_turned_back_on() {
        let mut d = display(DisplayConfig::primary());
        let fences = d.engine().fences.clone();
        d.set_power_mode(PowerMode::Off).expect("off");
        run(&mut d, &mut frame(&[1], &fences));
        assert_eq!(d.pending_flush(), Some(FlushReason::PowerOff));

        d.set_power_mode(PowerMode::On).expect("on");
        run(&mut d, &mut frame(&[1], &fences));
        assert_eq!(d.pending_flush(), None);
        assert!(d.stack().flags().contains(StackFlags::GEOMETRY_CHANGED));
        assert_eq!(d.engine().power_modes, vec![PowerMode::Off, PowerMode::On]);
    }

    #[test]
    fn permission_denied_in_prepare_flushes_quietly() {
        let mut d = display(DisplayConfig::primary());
        d.engine_mut().prepare_error = Some(EngineError::Permission);
        let fences = d.engine().fences.clone();
        let mut content = frame(&[1], &fences);
        run(&mut d, &mut content);

        assert_eq!(d.pending_flush(), Some(FlushReason::EngineError));
        assert_eq!(content.layers[0].composition, ClientComposition::Device);
        assert_eq!(d.engine().commit_calls, 0);
        assert!(!d.is_shut_down());
        assert_eq!(fences.open(), 0);
    }

    #[test]
    fn failed_commit_flushes_and_closes_fences() {
        let mut d = display(DisplayConfig::primary());
        d.engine_mut().commit_error = Some(EngineError::Resources);
        let fences = d.engine().fences.clone();
        let mut content = frame(&[1, 2], &fences);
        run(&mut d, &mut content);

        assert_eq!(d.pending_flush(), Some(FlushReason::EngineError));
        assert_eq!(d.engine().acquire_fences_seen, 3);
        assert_eq!(d.engine().flush_calls, 1);
        assert!(content.retire_fence.is_none());
        assert_eq!(fences.open(), 0);

        run(&mut d, &mut frame(&[1, 2], &fences));
        assert_eq!(d.pending_flush(), None, "next frame goes through");
    }

    #[test]
    fn content_without_target_is_rejected() {
        let mut d = display(DisplayConfig::primary());
        let fences = d.engine().fences.clone();
        let mut content = ContentList::new(vec![
            ContentLayer::new(handle(1)).with_acquire_fence(fences.fence()),
        ]);
        let mut tracer = Tracer::none();
        assert!(matches!(
            d.prepare(&mut content, &mut tracer),
            Err(DisplayError::InvalidParameters(_))
        ));
        d.commit(&mut content, &mut tracer).expect("commit flushes");
        d.post_commit(&mut content, &mut tracer);
        assert_eq!(d.engine().flush_calls, 1);
        assert_eq!(fences.open(), 0);
    }

    #[test]
    fn output_dump_allocates_once_and_frees_after_the_last_frame() {
        let alloc = FakeAllocator::default();
        let stats = alloc.stats();
        let mut d = display(DisplayConfig::primary()).with_allocator(Box::new(alloc));
        let fences = d.engine().fences.clone();

        d.perform(DisplayCommand::SetFrameDumpConfig {
            frames: 2,
            output: true,
        })
        .expect("dump");
        assert_eq!(stats.allocated(), 1);

        for _ in 0..3 {
            run(&mut d, &mut frame(&[1], &fences));
        }
        assert_eq!(d.engine().output_seen, 2, "two frames rendered to the dump");
        assert_eq!(stats.freed(), 1);
        drop(d);
        assert_eq!(stats.freed(), 1, "never freed twice");
        assert_eq!(fences.open(), 0, "output release fences closed");
    }

    #[test]
    fn dropping_the_display_frees_a_pending_dump() {
        let alloc = FakeAllocator::default();
        let stats = alloc.stats();
        let mut d = display(DisplayConfig::primary()).with_allocator(Box::new(alloc));
        d.perform(DisplayCommand::SetFrameDumpConfig {
            frames: 10,
            output: true,
        })
        .expect("dump");
        drop(d);
        assert_eq!((stats.allocated(), stats.freed()), (1, 1));
    }

    #[test]
    fn commands_validate_their_payloads() {
        let mut d = display(DisplayConfig::primary());
        assert!(matches!(
            d.perform(DisplayCommand::SetForcedRefreshRate(90)),
            Err(DisplayError::InvalidParameters(_))
        ));
        assert!(
            d.perform(DisplayCommand::SetActionSafe(Some(ActionSafe {
                width_percent: 5,
                height_percent: 5,
            })))
            .is_err(),
            "action safe is external only"
        );
        assert!(
            d.perform(DisplayCommand::SetFrameDumpConfig {
                frames: 1,
                output: true,
            })
            .is_err(),
            "output dump needs an allocator"
        );

        d.perform(DisplayCommand::SetMaxMixerStages(4)).expect("stages");
        d.perform(DisplayCommand::SetIdleTimeout(100)).expect("idle");
        d.perform(DisplayCommand::SetActiveConfig(1)).expect("config");
        let engine = d.engine();
        assert_eq!(engine.mixer_stages, vec![4]);
        assert_eq!(engine.idle_timeouts, vec![70, 100], "initial timeout pushed");
        assert_eq!(engine.active_configs, vec![1]);
    }

    #[test]
    fn invalid_action_safe_is_rejected_on_external() {
        let mut d = Display::new(
            DisplayId::EXTERNAL,
            DisplayConfig::external(),
            FakeEngine::new(64, 64),
        )
        .expect("display");
        assert!(
            d.perform(DisplayCommand::SetActionSafe(Some(ActionSafe {
                width_percent: 101,
                height_percent: 0,
            })))
            .is_err()
        );
        d.perform(DisplayCommand::SetActionSafe(None))
            .expect("clear");
    }

    #[test]
    fn action_safe_shrinks_external_frames_around_the_centre() {
        let mut d = Display::new(
            DisplayId::EXTERNAL,
            DisplayConfig::external(),
            FakeEngine::new(1000, 600),
        )
        .expect("display");
        d.perform(DisplayCommand::SetActionSafe(Some(ActionSafe {
            width_percent: 10,
            height_percent: 10,
        })))
        .expect("action safe");
        let fences = d.engine().fences.clone();

        let mut content = frame(&[1, 2], &fences);
        content.layers[0] = ContentLayer::new(handle(1))
            .with_display_frame(Rect::new(0.0, 0.0, 1000.0, 600.0));
        content.layers[1] = ContentLayer::new(handle(2))
            .with_display_frame(Rect::new(100.0, 100.0, 500.0, 300.0));
        run(&mut d, &mut content);

        // 900x540 centred in the 1000x600 mixer.
        let seen = &d.engine().dst_rects;
        assert_eq!(seen[0], Rect::new(50.0, 30.0, 950.0, 570.0));
        assert_eq!(seen[1], Rect::new(140.0, 120.0, 500.0, 300.0));
        assert_eq!(d.stack().layers()[1].dst_rect, seen[1]);
    }

    #[test]
    fn gpu_compositions_map_to_client_only_when_refreshing() {
        assert_eq!(
            client_composition(Composition::Gpu, true),
            ClientComposition::Client
        );
        assert_eq!(
            client_composition(Composition::Gpu, false),
            ClientComposition::Device
        );
        assert_eq!(
            client_composition(Composition::HwCursor, true),
            ClientComposition::Cursor
        );
        assert_eq!(
            client_composition(Composition::GpuTarget, false),
            ClientComposition::Target
        );
    }
}
