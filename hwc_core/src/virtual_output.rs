// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Output buffer binding for off-screen displays.
//!
//! A virtual display renders into a buffer the window system supplies with
//! every frame. The buffer's shape may change between frames (dynamic
//! resolution change); when it does, the engine is reconfigured before the
//! new buffer is accepted.

use crate::content::BufferHandle;
use crate::engine::{DisplayEngine, OutputConfig};
use crate::error::DisplayError;
use crate::format::{self, HalFormat};
use crate::layer::{BufferFlags, LayerBuffer};

/// A change of output geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconfiguration {
    /// Geometry bound before, if any.
    pub previous: Option<OutputConfig>,
    /// Geometry bound now.
    pub current: OutputConfig,
}

/// Tracks the output geometry the engine is configured for.
#[derive(Clone, Copy, Debug, Default)]
pub struct VirtualOutputBinder {
    bound: Option<OutputConfig>,
}

impl VirtualOutputBinder {
    /// A binder with nothing bound.
    #[must_use]
    pub const fn new() -> Self {
        Self { bound: None }
    }

    /// The geometry currently bound.
    #[must_use]
    pub fn bound(&self) -> Option<OutputConfig> {
        self.bound
    }

    /// Resolves the geometry an output handle needs.
    ///
    /// RGBA outputs are written as RGBX since the alpha channel is never
    /// scanned out. Slice dimensions from the buffer metadata take priority
    /// over the aligned buffer dimensions.
    pub fn resolve(handle: &BufferHandle) -> Result<OutputConfig, DisplayError> {
        let code = if handle.format == HalFormat::RGBA_8888 {
            HalFormat::RGBX_8888
        } else {
            handle.format
        };
        let format = format::resolve(code, handle.flags)?;
        let (width, height) = match handle.slice {
            Some(slice) => (slice.width, slice.height),
            None => format::aligned_dimensions(handle.width, handle.height, format),
        };
        if width == 0 || height == 0 {
            return Err(DisplayError::InvalidParameters("empty output buffer"));
        }
        Ok(OutputConfig {
            width,
            height,
            format,
        })
    }

    /// Binds an output handle, reconfiguring the engine first when the
    /// geometry changed.
    ///
    /// On failure the previous binding is kept.
    pub fn bind<E: DisplayEngine + ?Sized>(
        &mut self,
        handle: &BufferHandle,
        engine: &mut E,
    ) -> Result<(LayerBuffer, Option<Reconfiguration>), DisplayError> {
        let config = Self::resolve(handle)?;
        let reconfig = if self.bound == Some(config) {
            None
        } else {
            engine.set_output_config(&config)?;
            let previous = self.bound.replace(config);
            Some(Reconfiguration {
                previous,
                current: config,
            })
        };
        let mut buffer =
            LayerBuffer::from_handle(handle, config.format, config.width, config.height);
        // Only the secure bit is meaningful on an output.
        buffer.flags &= BufferFlags::SECURE;
        Ok((buffer, reconfig))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{BufferId, HandleFlags, Slice};
    use crate::engine::EngineError;
    use crate::format::LayerBufferFormat;
    use crate::testing::FakeEngine;

    fn output(w: u32, h: u32) -> BufferHandle {
        BufferHandle::new(BufferId(0x77), w, h, HalFormat::RGBA_8888)
    }

    #[test]
    fn rgba_is_canonicalized_to_rgbx() {
        let cfg = VirtualOutputBinder::resolve(&output(1920, 1080)).expect("resolve");
        assert_eq!(cfg.format, LayerBufferFormat::Rgbx8888);
        assert_eq!((cfg.width, cfg.height), (1920, 1080));
    }

    #[test]
    fn slice_dimensions_take_priority() {
        let mut h = output(1000, 700);
        h.slice = Some(Slice {
            width: 992,
            height: 700,
        });
        let cfg = VirtualOutputBinder::resolve(&h).expect("resolve");
        assert_eq!((cfg.width, cfg.height), (992, 700));

        h.slice = None;
        let cfg = VirtualOutputBinder::resolve(&h).expect("resolve");
        assert_eq!((cfg.width, cfg.height), (1024, 700), "width aligned to 32");
    }

    #[test]
    fn resolution_change_reconfigures_before_binding() {
        let mut engine = FakeEngine::new(1920, 1080);
        let mut binder = VirtualOutputBinder::new();

        let (buf, reconfig) = binder.bind(&output(1920, 1080), &mut engine).expect("bind");
        assert_eq!(buf.width, 1920);
        assert_eq!(reconfig.map(|r| r.previous), Some(None), "first bind configures");

        let (_, reconfig) = binder.bind(&output(1920, 1080), &mut engine).expect("bind");
        assert!(reconfig.is_none(), "same geometry keeps the binding");

        let (buf, reconfig) = binder.bind(&output(1280, 720), &mut engine).expect("bind");
        assert_eq!((buf.width, buf.height), (1280, 720));
        let reconfig = reconfig.expect("reconfigured");
        assert_eq!(reconfig.previous.map(|c| c.width), Some(1920));
        assert_eq!(engine.output_configs.len(), 2, "engine saw both geometries");
        assert_eq!(engine.output_configs[1].height, 720);
    }

    #[test]
    fn failed_reconfiguration_keeps_the_old_binding() {
        let mut engine = FakeEngine::new(1920, 1080);
        let mut binder = VirtualOutputBinder::new();
        binder.bind(&output(1920, 1080), &mut engine).expect("bind");

        engine.output_config_error = Some(EngineError::Resources);
        assert_eq!(
            binder.bind(&output(1280, 720), &mut engine).map(|_| ()),
            Err(DisplayError::Engine(EngineError::Resources))
        );
        assert_eq!(binder.bound().map(|c| c.width), Some(1920));
    }

    #[test]
    fn secure_flag_carries_to_the_output() {
        let mut h = output(640, 480);
        h.flags = HandleFlags::SECURE | HandleFlags::VIDEO;
        let mut engine = FakeEngine::new(640, 480);
        let (buf, _) = VirtualOutputBinder::new()
            .bind(&h, &mut engine)
            .expect("bind");
        assert_eq!(buf.flags, BufferFlags::SECURE);
    }

    #[test]
    fn invalid_output_format_is_rejected() {
        let h = BufferHandle::new(BufferId(1), 64, 64, HalFormat(0x4242));
        let mut engine = FakeEngine::new(64, 64);
        assert_eq!(
            VirtualOutputBinder::new().bind(&h, &mut engine).map(|_| ()),
            Err(DisplayError::UnsupportedFormat(0x4242))
        );
    }
}
