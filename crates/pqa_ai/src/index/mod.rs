use pqa_core::domain::{now_rfc3339_utc, Chunk};
use pqa_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embeddings::Embedder;

mod store;

pub use store::JsonVectorStore;

/// Description of one persisted index build.
///
/// `generation` increases by one on every build at the same location; an answer pipeline is
/// bound to exactly one generation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexHandle {
    pub location: String,
    pub generation: u64,
    pub model: String,
    pub dims: u32,
    pub chunk_count: u32,
    pub sources: Vec<String>,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A stored entry ranked by cosine similarity to a query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
    pub score: f32,
}

/// Persistence and nearest-neighbour search for embedded chunks.
pub trait VectorStore {
    fn location(&self) -> String;

    /// Claim the next build generation. Survives `reset`, so numbers are never reused.
    fn next_generation(&self) -> Result<u64, AppError>;

    /// Number of entries currently stored.
    fn count(&self) -> Result<usize, AppError>;

    /// Handle of the last committed build, `None` when nothing is indexed.
    fn current(&self) -> Result<Option<IndexHandle>, AppError>;

    /// Drop every entry and the committed handle.
    fn reset(&self) -> Result<(), AppError>;

    fn upsert(&self, entries: &[IndexEntry]) -> Result<(), AppError>;

    /// Record `handle` as the committed build. Written last so a half-written index is never
    /// reported as ready.
    fn commit(&self, handle: &IndexHandle) -> Result<(), AppError>;

    /// Up to `k` entries, most similar first, ties broken by chunk id.
    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, AppError>;
}

/// Embed `chunks` and replace whatever the store held before.
///
/// The store is only touched after every embedding succeeded, so an unreachable embedder leaves
/// the previous index intact.
pub fn build_index(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    model: &str,
) -> Result<IndexHandle, AppError> {
    if chunks.is_empty() {
        return Err(AppError::new(
            "AI_INDEX_EMPTY",
            "No text could be extracted from the supplied documents",
        ));
    }

    let mut entries: Vec<IndexEntry> = Vec::with_capacity(chunks.len());
    let mut dims: Option<u32> = None;
    for chunk in chunks {
        let v = embedder.embed(model, &chunk.text).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to compute embeddings")
                .with_details(format!("chunk_id={}; err={}", chunk.chunk_id, e))
                .with_retryable(e.retryable)
        })?;
        let this_dims = v.len() as u32;
        match dims {
            Some(d) if d != this_dims => {
                return Err(AppError::new(
                    "AI_EMBEDDINGS_FAILED",
                    "Embedding dimension mismatch across chunks",
                )
                .with_details(format!(
                    "expected={}; got={}; chunk_id={}",
                    d, this_dims, chunk.chunk_id
                )));
            }
            Some(_) => {}
            None => dims = Some(this_dims),
        }
        entries.push(IndexEntry {
            chunk: chunk.clone(),
            vector: v,
        });
    }

    let generation = store.next_generation()?;

    let mut sources: Vec<String> = chunks.iter().map(|c| c.source.clone()).collect();
    sources.sort();
    sources.dedup();

    store.reset()?;
    store.upsert(&entries)?;
    let stored = store.count()?;
    if stored != entries.len() {
        warn!(embedded = entries.len(), stored, "store merged entries with equal chunk ids");
    }

    let handle = IndexHandle {
        location: store.location(),
        generation,
        model: model.to_string(),
        dims: dims.unwrap_or(0),
        chunk_count: stored as u32,
        sources,
        built_at: now_rfc3339_utc()?,
    };
    store.commit(&handle)?;

    info!(
        location = %handle.location,
        generation = handle.generation,
        chunks = handle.chunk_count,
        dims = handle.dims,
        "index built"
    );
    Ok(handle)
}
