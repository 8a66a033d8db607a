// Shared test support: deterministic gateway + tiny generated fixtures.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use std::path::Path;

use crate::embedding::EmbeddingGateway;
use crate::error::EmbedError;

/// Derives a 2-dim vector from the red channel of the top-left pixel:
/// `[r/10, r/10]`. Deterministic across runs, so rebuilt indexes are
/// byte-identical.
pub struct PixelGateway;

impl EmbeddingGateway for PixelGateway {
    fn dimension(&self) -> usize {
        2
    }

    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbedError> {
        let red = image.get_pixel(0, 0).0[0] as f32;
        Ok(vec![red / 10.0, red / 10.0])
    }
}

/// Write a 16x16 solid-color PNG whose red channel encodes the fixture's
/// embedding (see [`PixelGateway`]).
pub fn write_png(path: &Path, red: u8) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_pixel(16, 16, Rgb([red, 0, 0]))
        .save(path)
        .unwrap();
}
