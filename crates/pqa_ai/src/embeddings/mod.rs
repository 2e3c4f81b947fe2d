use pqa_core::error::AppError;

/// Text to fixed-length vector. Implementations must return vectors of one dimension per model.
pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;
