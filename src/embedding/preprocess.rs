// CLIP-style preprocessing for the ViT-B/32 vision tower: shortest side to
// 224, center crop, rescale, normalize with the CLIP channel statistics.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];
const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];
const INPUT_SIZE: u32 = 224;

/// Turn a decoded image into the `[1, 3, 224, 224]` pixel tensor the CLIP
/// vision model expects.
pub fn clip_pixel_tensor(img: &DynamicImage) -> Array4<f32> {
    let (width, height) = img.dimensions();

    // Shortest side to 224, aspect ratio preserved.
    let (scaled_w, scaled_h) = if width < height {
        (
            INPUT_SIZE,
            (INPUT_SIZE as f32 * height as f32 / width as f32) as u32,
        )
    } else {
        (
            (INPUT_SIZE as f32 * width as f32 / height as f32) as u32,
            INPUT_SIZE,
        )
    };
    let resized = img.resize_exact(scaled_w, scaled_h, FilterType::Lanczos3);

    // Center crop to 224x224.
    let crop_x = (scaled_w.saturating_sub(INPUT_SIZE)) / 2;
    let crop_y = (scaled_h.saturating_sub(INPUT_SIZE)) / 2;
    let rgb = resized
        .crop_imm(crop_x, crop_y, INPUT_SIZE, INPUT_SIZE)
        .to_rgb8();

    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for (channel, &value) in pixel.0.iter().enumerate() {
            tensor[[0, channel, y as usize, x as usize]] =
                (value as f32 / 255.0 - CLIP_MEAN[channel]) / CLIP_STD[channel];
        }
    }

    tensor
}
