// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Translation of window-system geometry into the internal layer model.
//!
//! Window-system rectangles are fractional. The display hardware works on
//! whole pixels, so source crops are expanded outward and destinations are
//! snapped so that a layer's size never drifts from frame to frame.

use kurbo::Rect;

use crate::content::{ClientBlending, HalTransform};
use crate::layer::{LayerBlending, LayerRect};

/// Rotation in 90 degree steps, clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    /// No rotation.
    #[default]
    R0,
    /// 90 degrees.
    R90,
    /// 180 degrees.
    R180,
    /// 270 degrees.
    R270,
}

impl Rotation {
    /// Rotation in degrees.
    #[must_use]
    pub const fn degrees(self) -> u32 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }
}

/// A layer's orientation: a rotation followed by optional mirroring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LayerTransform {
    /// Rotation.
    pub rotation: Rotation,
    /// Mirror horizontally.
    pub flip_horizontal: bool,
    /// Mirror vertically.
    pub flip_vertical: bool,
}

/// Converts window-system transform bits.
///
/// Both flips together are folded into a half turn, so a transform is never
/// represented two ways.
#[must_use]
pub fn layer_transform(bits: HalTransform) -> LayerTransform {
    let h = bits.contains(HalTransform::FLIP_H);
    let v = bits.contains(HalTransform::FLIP_V);
    let rot90 = bits.contains(HalTransform::ROT_90);
    match (rot90, h && v) {
        (false, true) => LayerTransform {
            rotation: Rotation::R180,
            ..LayerTransform::default()
        },
        (true, true) => LayerTransform {
            rotation: Rotation::R270,
            ..LayerTransform::default()
        },
        (rot90, false) => LayerTransform {
            rotation: if rot90 { Rotation::R90 } else { Rotation::R0 },
            flip_horizontal: h,
            flip_vertical: v,
        },
    }
}

/// Converts a window-system blend mode.
#[must_use]
pub const fn layer_blending(blending: ClientBlending) -> LayerBlending {
    match blending {
        ClientBlending::None => LayerBlending::Opaque,
        ClientBlending::Premultiplied => LayerBlending::Premultiplied,
        ClientBlending::Coverage => LayerBlending::Coverage,
    }
}

/// Snaps a source crop outward to whole pixels.
#[must_use]
pub fn source_rect(crop: Rect) -> LayerRect {
    Rect::new(
        crop.x0.floor(),
        crop.y0.floor(),
        crop.x1.ceil(),
        crop.y1.ceil(),
    )
}

/// Snaps a destination frame to whole pixels.
///
/// The origin is floored and the far edges are derived from the truncated
/// size, so rounding never grows or shrinks the layer.
#[must_use]
pub fn destination_rect(frame: Rect) -> LayerRect {
    let left = frame.x0.floor();
    let top = frame.y0.floor();
    let width = (frame.x1 - frame.x0).trunc();
    let height = (frame.y1 - frame.y0).trunc();
    Rect::new(left, top, left + width, top + height)
}

/// Converts a source rectangle to one field of an interlaced buffer.
///
/// The height is halved and the top snapped down to an even line.
#[must_use]
pub fn deinterlace(rect: LayerRect) -> LayerRect {
    let half_height = (rect.y1 - rect.y0) / 2.0;
    let top = floor_to_even((rect.y0 / 2.0 + 0.5).trunc());
    Rect::new(rect.x0, top, rect.x1, top + half_height.floor())
}

fn floor_to_even(value: f64) -> f64 {
    (value / 2.0).floor() * 2.0
}

/// Action-safe area of an external display, in percent of the mixer size
/// trimmed from each axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ActionSafe {
    /// Percentage of the width to trim, 0 to 100.
    pub width_percent: u32,
    /// Percentage of the height to trim, 0 to 100.
    pub height_percent: u32,
}

impl ActionSafe {
    /// Whether both percentages are in range.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.width_percent <= 100 && self.height_percent <= 100
    }
}

/// Shrinks destinations toward the centre of the mixer for sinks that
/// overscan.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScanAdjustment {
    /// Trim amounts.
    pub action_safe: ActionSafe,
    /// Mixer width the destinations are expressed in.
    pub mixer_width: u32,
    /// Mixer height the destinations are expressed in.
    pub mixer_height: u32,
}

impl ScanAdjustment {
    /// Returns the adjustment to apply, or `None` when the sink underscans by
    /// itself or nothing would change.
    #[must_use]
    pub fn new(
        action_safe: ActionSafe,
        mixer_width: u32,
        mixer_height: u32,
        underscan_supported: bool,
    ) -> Option<Self> {
        let degenerate = action_safe.width_percent == 0
            || action_safe.height_percent == 0
            || mixer_width == 0
            || mixer_height == 0;
        (!underscan_supported && !degenerate).then_some(Self {
            action_safe,
            mixer_width,
            mixer_height,
        })
    }

    /// Applies the adjustment to a destination rectangle.
    #[must_use]
    pub fn apply(&self, rect: LayerRect) -> LayerRect {
        let (new_w, off_x) = shrink(self.mixer_width, self.action_safe.width_percent);
        let (new_h, off_y) = shrink(self.mixer_height, self.action_safe.height_percent);
        let mw = f64::from(self.mixer_width);
        let mh = f64::from(self.mixer_height);
        Rect::new(
            (rect.x0 * new_w / mw + off_x).trunc(),
            (rect.y0 * new_h / mh + off_y).trunc(),
            (rect.x1 * new_w / mw + off_x).trunc(),
            (rect.y1 * new_h / mh + off_y).trunc(),
        )
    }
}

/// Returns the shrunk extent and the offset that centres it.
fn shrink(mixer: u32, percent: u32) -> (f64, f64) {
    let mixer = f64::from(mixer);
    let ratio = f64::from(percent) / 100.0;
    let new = (mixer * (1.0 - ratio)).trunc();
    (new, ((mixer - new) / 2.0).trunc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_expands_outward() {
        let r = source_rect(Rect::new(0.5, 1.25, 10.1, 20.9));
        assert_eq!(r, Rect::new(0.0, 1.0, 11.0, 21.0));
    }

    #[test]
    fn destination_keeps_truncated_size() {
        // Width 10.9 truncates to 10 even though the right edge would ceil
        // to 12.
        let r = destination_rect(Rect::new(1.5, 2.5, 12.4, 22.9));
        assert_eq!(r, Rect::new(1.0, 2.0, 11.0, 22.0));
        assert_eq!(r.width(), 10.0, "size comes from the truncated width");
    }

    #[test]
    fn deinterlace_halves_and_snaps_top() {
        let r = deinterlace(Rect::new(0.0, 7.0, 720.0, 487.0));
        // top: trunc(3.5 + 0.5) = 4, already even; height 480 / 2 = 240.
        assert_eq!(r, Rect::new(0.0, 4.0, 720.0, 244.0));

        let odd = deinterlace(Rect::new(0.0, 5.0, 16.0, 15.0));
        // trunc(2.5 + 0.5) = 3 snaps down to 2.
        assert_eq!(odd.y0, 2.0);
        assert_eq!(odd.y1, 7.0);
    }

    #[test]
    fn transform_folds_double_flip() {
        assert_eq!(
            layer_transform(HalTransform::ROT_180).rotation,
            Rotation::R180
        );
        let t = layer_transform(HalTransform::ROT_270);
        assert_eq!(t.rotation, Rotation::R270);
        assert!(!t.flip_horizontal && !t.flip_vertical, "no residual flips");
        let t = layer_transform(HalTransform::ROT_90 | HalTransform::FLIP_H);
        assert_eq!(t.rotation, Rotation::R90);
        assert!(t.flip_horizontal && !t.flip_vertical);
        assert_eq!(layer_transform(HalTransform::empty()), LayerTransform::default());
    }

    #[test]
    fn scan_adjustment_centres_the_frame() {
        let safe = ActionSafe {
            width_percent: 10,
            height_percent: 10,
        };
        let adj = ScanAdjustment::new(safe, 1920, 1080, false).expect("adjustment applies");
        let r = adj.apply(Rect::new(0.0, 0.0, 1920.0, 1080.0));
        assert_eq!(r, Rect::new(96.0, 54.0, 1824.0, 1026.0));
    }

    #[test]
    fn scan_adjustment_skipped_when_sink_underscans() {
        let safe = ActionSafe {
            width_percent: 5,
            height_percent: 5,
        };
        assert!(ScanAdjustment::new(safe, 1920, 1080, true).is_none());
        assert!(ScanAdjustment::new(ActionSafe::default(), 1920, 1080, false).is_none());
        assert!(ScanAdjustment::new(safe, 0, 1080, false).is_none());
    }
}
