use std::rc::Rc;

use pqa_core::config::RetrievalConfig;
use pqa_core::domain::Chunk;
use pqa_core::error::AppError;
use tracing::{debug, warn};

use crate::embeddings::Embedder;
use crate::index::{IndexHandle, VectorStore};

pub mod mmr;
pub(crate) mod similarity;

/// Query-time access to the vector store with diversity-aware ranking.
///
/// A retriever may be bound to one index build; a bound retriever refuses to search a store whose
/// committed handle differs from it in any field.
#[derive(Clone)]
pub struct Retriever {
    store: Rc<dyn VectorStore>,
    embedder: Rc<dyn Embedder>,
    cfg: RetrievalConfig,
    bound: Option<IndexHandle>,
}

impl Retriever {
    pub fn new(
        store: Rc<dyn VectorStore>,
        embedder: Rc<dyn Embedder>,
        cfg: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            cfg,
            bound: None,
        }
    }

    pub fn bind(mut self, handle: IndexHandle) -> Self {
        self.bound = Some(handle);
        self
    }

    pub fn bound_handle(&self) -> Option<&IndexHandle> {
        self.bound.as_ref()
    }

    /// Up to `k` chunks for `query`, most relevant first with near-duplicates pushed down.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>, AppError> {
        let q = query.trim();
        if q.is_empty() {
            return Err(AppError::new("AI_RETRIEVAL_FAILED", "Query must not be empty"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let current = self.store.current()?.ok_or_else(|| {
            AppError::new(
                "AI_INDEX_NOT_READY",
                "Index not ready; process documents before asking questions",
            )
        })?;
        if let Some(bound) = self.bound.as_ref() {
            if bound != &current {
                return Err(AppError::new(
                    "AI_PIPELINE_STALE",
                    "Index changed since this pipeline was built",
                )
                .with_details(format!(
                    "bound_generation={}; current_generation={}",
                    bound.generation, current.generation
                )));
            }
        }

        // Queries are embedded with the model the index was built with.
        let qv = self.embedder.embed(&current.model, q).map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to embed question")
                .with_details(e.to_string())
                .with_retryable(e.retryable)
        })?;

        let fetch_k = self.cfg.fetch_k.max(k);
        let candidates = self.store.query(&qv, fetch_k)?;
        let vectors: Vec<Vec<f32>> = candidates.iter().map(|c| c.vector.clone()).collect();
        let picked = mmr::select(&qv, &vectors, k, self.cfg.mmr_lambda);
        debug!(
            candidates = candidates.len(),
            picked = picked.len(),
            generation = current.generation,
            "retrieved context"
        );

        Ok(picked
            .into_iter()
            .map(|i| candidates[i].chunk.clone())
            .collect())
    }

    pub fn top_k(&self) -> usize {
        self.cfg.top_k
    }
}

/// Search that treats a missing index as "nothing to search": the error is logged and an empty
/// list is returned. Other failures still propagate.
pub fn retrieve_or_empty(
    retriever: &Retriever,
    query: &str,
    k: usize,
) -> Result<Vec<Chunk>, AppError> {
    match retriever.retrieve(query, k) {
        Err(e) if e.is("AI_INDEX_NOT_READY") => {
            warn!(err = %e, "retrieval skipped: no index");
            Ok(Vec::new())
        }
        other => other,
    }
}
