// CLIP ViT-B/32 vision embedder over ONNX Runtime. Produces L2-normalized
// 512-dim vectors.

use image::DynamicImage;
use ort::{session::Session, value::Tensor};
use std::path::Path;
use std::sync::Mutex;

use super::{preprocess, EmbeddingGateway};
use crate::error::EmbedError;

/// Output dimensionality of the CLIP ViT-B/32 image tower.
pub const CLIP_EMBED_DIM: usize = 512;

pub struct ClipVisionEmbedder {
    session: Mutex<Session>,
}

impl ClipVisionEmbedder {
    /// Load the vision model from an ONNX file.
    pub fn load(model_path: &Path) -> Result<Self, EmbedError> {
        log::info!("loading vision model from {}", model_path.display());

        let session = Session::builder()
            .map_err(|e| EmbedError::Provider(format!("failed to create session builder: {e}")))?
            .commit_from_file(model_path)
            .map_err(|e| EmbedError::Provider(format!("failed to load vision model: {e}")))?;

        log::debug!("vision model inputs: {:?}", session.inputs);
        log::debug!("vision model outputs: {:?}", session.outputs);

        Ok(Self {
            session: Mutex::new(session),
        })
    }
}

impl EmbeddingGateway for ClipVisionEmbedder {
    fn dimension(&self) -> usize {
        CLIP_EMBED_DIM
    }

    fn embed(&self, image: &DynamicImage) -> Result<Vec<f32>, EmbedError> {
        let pixel_values = preprocess::clip_pixel_tensor(image);

        let mut session = self
            .session
            .lock()
            .map_err(|_| EmbedError::Provider("vision session poisoned".to_string()))?;

        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "image_embeds".to_string());

        let input_tensor = Tensor::from_array(pixel_values)
            .map_err(|e| EmbedError::Provider(format!("failed to create input tensor: {e}")))?;

        let outputs = session
            .run(ort::inputs!["pixel_values" => input_tensor])
            .map_err(|e| EmbedError::Provider(format!("inference failed: {e}")))?;

        let output = outputs
            .get(&output_name)
            .ok_or_else(|| EmbedError::Provider(format!("output '{output_name}' not found")))?;

        let hidden = output
            .try_extract_array::<f32>()
            .map_err(|e| EmbedError::Provider(format!("failed to extract output tensor: {e}")))?;

        let shape = hidden.shape().to_vec();
        let embedding: Vec<f32> = match shape.len() {
            // [batch, seq_len, hidden] - take the CLS token.
            3 => (0..shape[2]).map(|i| hidden[[0, 0, i]]).collect(),
            // [batch, hidden] - already pooled.
            2 => (0..shape[1]).map(|i| hidden[[0, i]]).collect(),
            _ => {
                return Err(EmbedError::Provider(format!(
                    "unexpected output shape: {shape:?}"
                )))
            }
        };

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm < 1e-12 {
            return Err(EmbedError::Provider("zero-norm embedding".to_string()));
        }

        Ok(embedding.iter().map(|x| x / norm).collect())
    }
}
