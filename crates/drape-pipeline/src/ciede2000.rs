//! CIEDE2000 color difference.
//!
//! Sharma, Wu & Dalal, "The CIEDE2000 Color-Difference Formula:
//! Implementation Notes, Supplementary Test Data, and Mathematical
//! Observations" (2005), with parametric weights `kL = kC = kH = 1`.
//! The formula itself comes from `palette`; this module pins the
//! white point and the non-finite handling the classifier relies on.

use palette::color_difference::Ciede2000;
use palette::white_point::D65;

use crate::lab::Lab;

/// Perceptual distance between two Lab colors.
///
/// Zero for identical colors. A non-finite result (from NaN input)
/// yields `f64::INFINITY` so it can never win a nearest-color search.
#[must_use]
pub fn delta_e_2000(x: Lab, y: Lab) -> f64 {
    let x: palette::Lab<D65, f64> = x.into();
    let de = x.difference(y.into());
    if de.is_finite() { de } else { f64::INFINITY }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Selected pairs from Sharma et al. supplementary test data.
    const REFERENCE: &[((f64, f64, f64), (f64, f64, f64), f64)] = &[
        ((50.0, 2.6772, -79.7751), (50.0, 0.0, -82.7485), 2.0425),
        ((50.0, 3.1571, -77.2803), (50.0, 0.0, -82.7485), 2.8615),
        ((50.0, 2.8361, -74.0200), (50.0, 0.0, -82.7485), 3.4412),
        ((50.0, -1.3802, -84.2814), (50.0, 0.0, -82.7485), 1.0000),
        ((50.0, 0.0, 0.0), (50.0, -1.0, 2.0), 2.3669),
        ((50.0, 2.4900, -0.0010), (50.0, -2.4900, 0.0009), 7.1792),
        ((50.0, 2.4900, -0.0010), (50.0, -2.4900, 0.0011), 7.2195),
        ((50.0, 2.5000, 0.0000), (73.0, 25.0, -18.0), 27.1492),
        ((50.0, 2.5000, 0.0000), (50.0, 3.1736, 0.5854), 1.0000),
        ((60.2574, -34.0099, 36.2677), (60.4626, -34.1751, 39.4387), 1.2644),
        ((63.0109, -31.0961, -5.8663), (62.8187, -29.7946, -4.0864), 1.2630),
        ((22.7233, 20.0904, -46.6940), (23.0331, 14.9730, -42.5619), 2.0373),
        ((90.8027, -2.0831, 1.4410), (91.1528, -1.6435, 0.0447), 1.4441),
        ((2.0776, 0.0795, -1.1350), (0.9033, -0.0636, -0.5514), 0.9082),
    ];

    fn lab(t: (f64, f64, f64)) -> Lab {
        Lab::new(t.0, t.1, t.2)
    }

    #[test]
    fn matches_reference_pairs() {
        for &(a, b, expected) in REFERENCE {
            let de = delta_e_2000(lab(a), lab(b));
            assert!(
                (de - expected).abs() < 1e-3,
                "{a:?} vs {b:?}: got {de}, expected {expected}"
            );
        }
    }

    #[test]
    fn is_symmetric() {
        for &(a, b, _) in REFERENCE {
            let ab = delta_e_2000(lab(a), lab(b));
            let ba = delta_e_2000(lab(b), lab(a));
            assert!((ab - ba).abs() < 1e-9);
        }
    }

    #[test]
    fn identical_colors_have_zero_distance() {
        let c = Lab::new(42.0, 17.5, -8.25);
        assert!(delta_e_2000(c, c).abs() < 1e-12);
        let gray = Lab::new(50.0, 0.0, 0.0);
        assert!(delta_e_2000(gray, gray).abs() < 1e-12);
    }

    #[test]
    fn nan_input_is_infinitely_far() {
        let nan = Lab::new(f64::NAN, 0.0, 0.0);
        assert!(delta_e_2000(nan, Lab::new(50.0, 0.0, 0.0)).is_infinite());
        let inf = Lab::new(50.0, f64::INFINITY, 0.0);
        assert!(delta_e_2000(Lab::new(50.0, 0.0, 0.0), inf).is_infinite());
    }

    #[test]
    fn lightness_only_difference_is_weighted_near_mid_gray() {
        // At L = 50 the lightness weight is 1, so dE equals dL.
        let de = delta_e_2000(Lab::new(48.0, 0.0, 0.0), Lab::new(52.0, 0.0, 0.0));
        assert!((de - 4.0).abs() < 1e-9, "got {de}");
    }
}
