//! sRGB to CIE L*a*b* conversion (D65).
//!
//! The same path converts palette swatches and image samples, so any
//! change here moves both sides of the comparison together.

use palette::white_point::D65;
use palette::{FromColor, LinSrgb, Srgb, Xyz};
use serde::{Deserialize, Serialize};

/// D65 reference white, X component.
pub const WHITE_X: f64 = 0.950_47;
/// D65 reference white, Y component.
pub const WHITE_Y: f64 = 1.0;
/// D65 reference white, Z component.
pub const WHITE_Z: f64 = 1.088_83;

/// A color in CIE L*a*b*.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lab {
    /// Lightness, 0 (black) to 100 (white).
    pub l: f64,
    /// Green (negative) to red (positive).
    pub a: f64,
    /// Blue (negative) to yellow (positive).
    pub b: f64,
}

impl Lab {
    /// Create a new Lab color.
    #[must_use]
    pub const fn new(l: f64, a: f64, b: f64) -> Self {
        Self { l, a, b }
    }

    /// Distance from the neutral axis, `sqrt(a² + b²)`.
    #[must_use]
    pub fn chroma(self) -> f64 {
        self.a.hypot(self.b)
    }

    /// Returns `true` if all three components are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.l.is_finite() && self.a.is_finite() && self.b.is_finite()
    }
}

impl From<palette::Lab<D65, f64>> for Lab {
    fn from(lab: palette::Lab<D65, f64>) -> Self {
        Self::new(lab.l, lab.a, lab.b)
    }
}

impl From<Lab> for palette::Lab<D65, f64> {
    fn from(lab: Lab) -> Self {
        Self::new(lab.l, lab.a, lab.b)
    }
}

/// Decode one gamma-encoded sRGB channel in `[0, 1]` to linear light.
#[must_use]
pub fn srgb_to_linear(c: f64) -> f64 {
    let linear: LinSrgb<f64> = Srgb::new(c, c, c).into_linear();
    linear.red
}

/// Linear sRGB to CIE XYZ (D65, `Y = 1` for white).
#[must_use]
pub fn linear_rgb_to_xyz(r: f64, g: f64, b: f64) -> [f64; 3] {
    let xyz = Xyz::<D65, f64>::from_color(LinSrgb::new(r, g, b));
    [xyz.x, xyz.y, xyz.z]
}

/// CIE XYZ to L*a*b* relative to the D65 white point.
#[must_use]
pub fn xyz_to_lab(x: f64, y: f64, z: f64) -> Lab {
    palette::Lab::<D65, f64>::from_color(Xyz::<D65, f64>::new(x, y, z)).into()
}

/// Convert an 8-bit sRGB color to L*a*b*.
#[must_use]
pub fn srgb_to_lab(r: u8, g: u8, b: u8) -> Lab {
    let srgb: Srgb<f64> = Srgb::new(r, g, b).into_format();
    palette::Lab::<D65, f64>::from_color(srgb).into()
}
