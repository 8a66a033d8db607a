// Image embedding seam. The engine only depends on the `EmbeddingGateway`
// trait; the bundled ONNX CLIP embedder lives behind it, and tests plug in
// deterministic stubs.

pub mod preprocess;

#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub mod vision;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use std::path::Path;

use crate::error::EmbedError;

#[cfg(not(any(target_os = "android", target_os = "ios")))]
pub use vision::ClipVisionEmbedder;

/// One image in, one fixed-length vector out. Implementations report their
/// output dimensionality once and keep it stable for their whole lifetime.
pub trait EmbeddingGateway: Send + Sync {
    fn dimension(&self) -> usize;

    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbedError>;
}

/// Decode an image file, downscaling it (aspect ratio preserved, Lanczos3)
/// when either side exceeds `max_dim` pixels.
pub fn load_image(path: &Path, max_dim: u32) -> Result<DynamicImage, EmbedError> {
    let img = image::open(path)?;
    let (width, height) = img.dimensions();
    if width > max_dim || height > max_dim {
        Ok(img.resize(max_dim, max_dim, FilterType::Lanczos3))
    } else {
        Ok(img)
    }
}

/// Embed the image file at `path`. A produced vector whose length disagrees
/// with the gateway's reported dimensionality is a provider failure.
pub fn encode_file(
    gateway: &dyn EmbeddingGateway,
    path: &Path,
    max_dim: u32,
) -> Result<Vec<f32>, EmbedError> {
    let image = load_image(path, max_dim)?;
    let vector = gateway.embed(&image)?;
    if vector.len() != gateway.dimension() {
        return Err(EmbedError::Provider(format!(
            "gateway produced a {}-dim vector, expected {}",
            vector.len(),
            gateway.dimension()
        )));
    }
    Ok(vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct WrongDimGateway;

    impl EmbeddingGateway for WrongDimGateway {
        fn dimension(&self) -> usize {
            4
        }

        fn embed(&self, _image: &DynamicImage) -> Result<Vec<f32>, EmbedError> {
            Ok(vec![1.0, 2.0])
        }
    }

    #[test]
    fn oversized_images_are_downscaled_preserving_aspect() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::from_pixel(2048, 1024, Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let img = load_image(&path, 1024).unwrap();
        assert_eq!(img.dimensions(), (1024, 512));
    }

    #[test]
    fn small_images_are_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("small.png");
        RgbImage::from_pixel(320, 200, Rgb([1, 2, 3]))
            .save(&path)
            .unwrap();

        let img = load_image(&path, 1024).unwrap();
        assert_eq!(img.dimensions(), (320, 200));
    }

    #[test]
    fn unreadable_files_are_decode_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.png");
        std::fs::write(&path, b"this is not a png").unwrap();

        let err = load_image(&path, 1024).unwrap_err();
        assert!(matches!(err, EmbedError::Decode(_)));
    }

    #[test]
    fn dimension_mismatch_is_a_provider_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.png");
        RgbImage::from_pixel(8, 8, Rgb([0, 0, 0])).save(&path).unwrap();

        let err = encode_file(&WrongDimGateway, &path, 1024).unwrap_err();
        assert!(matches!(err, EmbedError::Provider(_)));
    }
}
