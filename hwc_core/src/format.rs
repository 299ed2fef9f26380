// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel formats and their alignment rules.
//!
//! Window-system buffers carry a numeric [`HalFormat`] code plus private
//! handle flags. [`resolve`] maps the pair onto the internal
//! [`LayerBufferFormat`], where UBWC compression is a format variant rather
//! than a separate flag.

use core::fmt;

use crate::content::HandleFlags;
use crate::error::DisplayError;

/// A window-system pixel format code.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HalFormat(pub u32);

impl HalFormat {
    /// 32-bit RGBA.
    pub const RGBA_8888: Self = Self(0x1);
    /// 32-bit RGB, alpha ignored.
    pub const RGBX_8888: Self = Self(0x2);
    /// 24-bit packed RGB.
    pub const RGB_888: Self = Self(0x3);
    /// 16-bit RGB.
    pub const RGB_565: Self = Self(0x4);
    /// 32-bit BGRA.
    pub const BGRA_8888: Self = Self(0x5);
    /// 16-bit RGBA with 1-bit alpha.
    pub const RGBA_5551: Self = Self(0x6);
    /// 16-bit RGBA with 4-bit channels.
    pub const RGBA_4444: Self = Self(0x7);
    /// YCbCr 4:2:2 semi-planar.
    pub const YCBCR_422_SP: Self = Self(0x10);
    /// YCrCb 4:2:0 semi-planar (NV21).
    pub const YCRCB_420_SP: Self = Self(0x11);
    /// YCbCr 4:2:2 interleaved.
    pub const YCBCR_422_I: Self = Self(0x14);
    /// 32-bit BGRX.
    pub const BGRX_8888: Self = Self(0x112);
    /// 16-bit BGR.
    pub const BGR_565: Self = Self(0x115);
    /// 32-bit RGBA with 10-bit colour channels.
    pub const RGBA_1010102: Self = Self(0x116);
    /// Encoder-compatible NV12.
    pub const NV12_ENCODEABLE: Self = Self(0x102);
    /// YCbCr 4:2:0 semi-planar (NV12).
    pub const YCBCR_420_SP: Self = Self(0x109);
    /// YCrCb 4:2:2 semi-planar.
    pub const YCRCB_422_SP: Self = Self(0x10B);
    /// Macro-tiled NV12.
    pub const YCBCR_420_SP_TILED: Self = Self(0x7FA3_0C03);
    /// NV12 laid out for the video codec.
    pub const YCBCR_420_SP_VENUS: Self = Self(0x7FA3_0C04);
    /// YCrCb 4:2:0 planar with 16-byte strides (YV12).
    pub const YV12: Self = Self(0x3231_5659);
}

impl fmt::Debug for HalFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HalFormat({:#x})", self.0)
    }
}

/// Internal pixel formats understood by the composition engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerBufferFormat {
    /// 32-bit RGBA.
    Rgba8888,
    /// 32-bit RGB, alpha ignored.
    Rgbx8888,
    /// 32-bit BGRA.
    Bgra8888,
    /// 32-bit BGRX.
    Bgrx8888,
    /// 24-bit packed RGB.
    Rgb888,
    /// 16-bit RGB.
    Rgb565,
    /// 16-bit BGR.
    Bgr565,
    /// 16-bit RGBA with 1-bit alpha.
    Rgba5551,
    /// 16-bit RGBA with 4-bit channels.
    Rgba4444,
    /// 32-bit RGBA with 10-bit colour channels.
    Rgba1010102,
    /// UBWC-compressed RGBA.
    Rgba8888Ubwc,
    /// UBWC-compressed RGBX.
    Rgbx8888Ubwc,
    /// UBWC-compressed BGR 565.
    Bgr565Ubwc,
    /// YV12.
    YCrCb420PlanarStride16,
    /// NV12.
    YCbCr420SemiPlanar,
    /// NV21.
    YCrCb420SemiPlanar,
    /// NV12 with video codec alignment.
    YCbCr420SemiPlanarVenus,
    /// UBWC-compressed NV12 with video codec alignment.
    YCbCr420SemiPlanarVenusUbwc,
    /// Macro-tiled NV12.
    YCbCr420SemiPlanarTiled,
    /// YCbCr 4:2:2 semi-planar.
    YCbCr422H2V1SemiPlanar,
    /// YCrCb 4:2:2 semi-planar.
    YCrCb422H2V1SemiPlanar,
    /// YCbCr 4:2:2 interleaved.
    YCbCr422H2V1Packed,
}

impl LayerBufferFormat {
    /// Returns whether this is a YUV format.
    #[must_use]
    pub const fn is_yuv(self) -> bool {
        matches!(
            self,
            Self::YCrCb420PlanarStride16
                | Self::YCbCr420SemiPlanar
                | Self::YCrCb420SemiPlanar
                | Self::YCbCr420SemiPlanarVenus
                | Self::YCbCr420SemiPlanarVenusUbwc
                | Self::YCbCr420SemiPlanarTiled
                | Self::YCbCr422H2V1SemiPlanar
                | Self::YCrCb422H2V1SemiPlanar
                | Self::YCbCr422H2V1Packed
        )
    }

    /// Returns whether the buffer uses UBWC compression.
    #[must_use]
    pub const fn is_ubwc(self) -> bool {
        matches!(
            self,
            Self::Rgba8888Ubwc
                | Self::Rgbx8888Ubwc
                | Self::Bgr565Ubwc
                | Self::YCbCr420SemiPlanarVenusUbwc
        )
    }

    /// Returns `(width_alignment, height_alignment)` in pixels.
    ///
    /// Panel, layer and off-screen output buffers all follow the same rules.
    #[must_use]
    pub const fn alignment(self) -> (u32, u32) {
        match self {
            Self::Rgba8888Ubwc | Self::Rgbx8888Ubwc | Self::Bgr565Ubwc => (64, 16),
            Self::YCbCr420SemiPlanarVenus | Self::YCbCr420SemiPlanarVenusUbwc => (128, 32),
            Self::YCbCr420SemiPlanarTiled => (128, 32),
            Self::YCrCb420PlanarStride16
            | Self::YCbCr420SemiPlanar
            | Self::YCrCb420SemiPlanar
            | Self::YCbCr422H2V1SemiPlanar
            | Self::YCrCb422H2V1SemiPlanar
            | Self::YCbCr422H2V1Packed => (16, 1),
            _ => (32, 1),
        }
    }

    /// Returns bytes per pixel as a `(numerator, denominator)` pair, averaged
    /// over all planes.
    #[must_use]
    pub const fn bytes_per_pixel(self) -> (u32, u32) {
        match self {
            Self::Rgba8888
            | Self::Rgbx8888
            | Self::Bgra8888
            | Self::Bgrx8888
            | Self::Rgba1010102
            | Self::Rgba8888Ubwc
            | Self::Rgbx8888Ubwc => (4, 1),
            Self::Rgb888 => (3, 1),
            Self::Rgb565
            | Self::Bgr565
            | Self::Rgba5551
            | Self::Rgba4444
            | Self::Bgr565Ubwc
            | Self::YCbCr422H2V1SemiPlanar
            | Self::YCrCb422H2V1SemiPlanar
            | Self::YCbCr422H2V1Packed => (2, 1),
            Self::YCrCb420PlanarStride16
            | Self::YCbCr420SemiPlanar
            | Self::YCrCb420SemiPlanar
            | Self::YCbCr420SemiPlanarVenus
            | Self::YCbCr420SemiPlanarVenusUbwc
            | Self::YCbCr420SemiPlanarTiled => (3, 2),
        }
    }

    /// Number of memory planes the format occupies.
    #[must_use]
    pub const fn plane_count(self) -> usize {
        match self {
            Self::YCrCb420PlanarStride16 => 3,
            Self::YCbCr420SemiPlanar
            | Self::YCrCb420SemiPlanar
            | Self::YCbCr420SemiPlanarVenus
            | Self::YCbCr420SemiPlanarVenusUbwc
            | Self::YCbCr420SemiPlanarTiled
            | Self::YCbCr422H2V1SemiPlanar
            | Self::YCrCb422H2V1SemiPlanar => 2,
            _ => 1,
        }
    }
}

/// Returns `(width, height)` rounded up to the format's alignment.
#[must_use]
pub fn aligned_dimensions(width: u32, height: u32, format: LayerBufferFormat) -> (u32, u32) {
    let (wa, ha) = format.alignment();
    (align_up(width, wa), align_up(height, ha))
}

/// Rounds `value` up to a multiple of `align`, saturating at the largest
/// aligned `u32`.
#[must_use]
pub const fn align_up(value: u32, align: u32) -> u32 {
    if align <= 1 {
        return value;
    }
    match value.checked_next_multiple_of(align) {
        Some(v) => v,
        None => u32::MAX - (u32::MAX % align),
    }
}

/// Maps a window-system format code and its handle flags to an internal
/// format.
///
/// The UBWC flag selects the compressed variant for the formats that have
/// one; it is ignored for the rest.
pub fn resolve(code: HalFormat, flags: HandleFlags) -> Result<LayerBufferFormat, DisplayError> {
    use LayerBufferFormat as F;

    if flags.contains(HandleFlags::UBWC) {
        match code {
            HalFormat::RGBA_8888 => return Ok(F::Rgba8888Ubwc),
            HalFormat::RGBX_8888 => return Ok(F::Rgbx8888Ubwc),
            HalFormat::BGR_565 | HalFormat::RGB_565 => return Ok(F::Bgr565Ubwc),
            HalFormat::YCBCR_420_SP_VENUS | HalFormat::NV12_ENCODEABLE => {
                return Ok(F::YCbCr420SemiPlanarVenusUbwc);
            }
            _ => {}
        }
    }

    let format = match code {
        HalFormat::RGBA_8888 => F::Rgba8888,
        HalFormat::RGBX_8888 => F::Rgbx8888,
        HalFormat::RGB_888 => F::Rgb888,
        HalFormat::RGB_565 => F::Rgb565,
        HalFormat::BGRA_8888 => F::Bgra8888,
        HalFormat::BGRX_8888 => F::Bgrx8888,
        HalFormat::BGR_565 => F::Bgr565,
        HalFormat::RGBA_5551 => F::Rgba5551,
        HalFormat::RGBA_4444 => F::Rgba4444,
        HalFormat::RGBA_1010102 => F::Rgba1010102,
        HalFormat::YV12 => F::YCrCb420PlanarStride16,
        HalFormat::YCBCR_420_SP => F::YCbCr420SemiPlanar,
        HalFormat::YCRCB_420_SP => F::YCrCb420SemiPlanar,
        HalFormat::YCBCR_420_SP_VENUS | HalFormat::NV12_ENCODEABLE => F::YCbCr420SemiPlanarVenus,
        HalFormat::YCBCR_420_SP_TILED => F::YCbCr420SemiPlanarTiled,
        HalFormat::YCBCR_422_SP => F::YCbCr422H2V1SemiPlanar,
        HalFormat::YCRCB_422_SP => F::YCrCb422H2V1SemiPlanar,
        HalFormat::YCBCR_422_I => F::YCbCr422H2V1Packed,
        HalFormat(other) => return Err(DisplayError::UnsupportedFormat(other)),
    };
    Ok(format)
}
