//! Mask visualization for debugging segmentations.
//!
//! The overlay is a solid blue image whose alpha channel is the mask
//! coverage, meant to be drawn over the ROI crop. Nothing in the
//! pipeline reads it back.

use std::collections::HashMap;

use image::{ImageEncoder, RgbaImage};

use crate::mask::Mask;
use crate::types::PipelineError;

/// Overlay tint.
pub const OVERLAY_RGB: [u8; 3] = [0, 0, 255];

/// Render `mask` as a blue overlay with alpha equal to coverage.
#[must_use]
pub fn render_mask_overlay(mask: &Mask) -> RgbaImage {
    let [r, g, b] = OVERLAY_RGB;
    let raw = mask
        .as_raw()
        .iter()
        .flat_map(|&coverage| [r, g, b, coverage])
        .collect();
    RgbaImage::from_raw(mask.width(), mask.height(), raw)
        .unwrap_or_else(|| RgbaImage::new(mask.width(), mask.height()))
}

/// Encode an RGBA image as PNG bytes.
///
/// # Errors
///
/// Returns [`PipelineError::ImageEncode`] if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(PipelineError::ImageEncode)?;
    Ok(buf)
}

/// Masks kept per request id so an overlay can be rendered after the
/// analysis has returned.
///
/// The store is owned by the caller. It does no locking or eviction;
/// wrap it in whatever synchronization and lifetime policy the host
/// needs.
#[derive(Debug, Default)]
pub struct MaskStore {
    masks: HashMap<String, Mask>,
}

impl MaskStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `mask` under `id`, returning the mask it replaced.
    pub fn insert(&mut self, id: impl Into<String>, mask: Mask) -> Option<Mask> {
        self.masks.insert(id.into(), mask)
    }

    /// Look up the mask stored under `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Mask> {
        self.masks.get(id)
    }

    /// Drop the mask stored under `id`.
    pub fn remove(&mut self, id: &str) -> Option<Mask> {
        self.masks.remove(id)
    }

    /// Number of stored masks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Overlay for the mask stored under `id`.
    #[must_use]
    pub fn render(&self, id: &str) -> Option<RgbaImage> {
        self.get(id).map(render_mask_overlay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn overlay_is_blue_with_coverage_alpha() {
        let mask = Mask::from_raw(3, 1, vec![0, 128, 255]).unwrap();
        let overlay = render_mask_overlay(&mask);
        assert_eq!(overlay.dimensions(), (3, 1));
        assert_eq!(overlay.get_pixel(0, 0).0, [0, 0, 255, 0]);
        assert_eq!(overlay.get_pixel(1, 0).0, [0, 0, 255, 128]);
        assert_eq!(overlay.get_pixel(2, 0).0, [0, 0, 255, 255]);
    }

    #[test]
    fn png_round_trips_through_decoder() {
        let overlay = render_mask_overlay(&Mask::filled(4, 2, 200));
        let png = encode_png(&overlay).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        let back = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(back, overlay);
    }

    #[test]
    fn store_renders_by_request_id() {
        let mut store = MaskStore::new();
        assert!(store.is_empty());
        assert!(store.insert("req-1", Mask::filled(2, 2, 255)).is_none());
        assert_eq!(store.len(), 1);
        let overlay = store.render("req-1").unwrap();
        assert!(overlay.pixels().all(|p| p.0 == [0, 0, 255, 255]));
        assert!(store.render("req-2").is_none());
    }

    #[test]
    fn insert_replaces_existing_mask() {
        let mut store = MaskStore::new();
        store.insert("id", Mask::filled(1, 1, 0));
        let old = store.insert("id", Mask::filled(1, 1, 255)).unwrap();
        assert!(!old.is_covered(0));
        assert!(store.get("id").unwrap().is_covered(0));
        assert!(store.remove("id").is_some());
        assert!(store.is_empty());
    }
}
