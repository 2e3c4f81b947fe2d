use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use pqa_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{IndexEntry, IndexHandle, ScoredEntry, VectorStore};
use crate::retrieve::similarity;

/// File-backed vector store: a JSON entry list plus a status file naming the committed build.
///
/// Layout under `root`:
/// - `index/index_status.json`: the committed [`IndexHandle`]
/// - `index/index_entries.json`: every [`IndexEntry`]
/// - `index/generation.json`: last issued build generation, kept across resets
#[derive(Debug, Clone)]
pub struct JsonVectorStore {
    root: PathBuf,
}

impl JsonVectorStore {
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("index_status.json")
    }

    fn entries_path(&self) -> PathBuf {
        self.index_dir().join("index_entries.json")
    }

    fn generation_path(&self) -> PathBuf {
        self.index_dir().join("generation.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.index_dir()).map_err(|e| {
            AppError::new("AI_INDEX_PERSIST_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.index_dir().display(), e))
        })
    }

    pub fn read_entries(&self) -> Result<Vec<IndexEntry>, AppError> {
        Ok(read_json(&self.entries_path(), "index entries")?.unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct GenerationCounter {
    last: u64,
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Option<T>, AppError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_READ_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        AppError::new("AI_INDEX_READ_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

/// Write via a sibling `.tmp` file and rename, so readers never see a partial file.
fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    what: &str,
) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_vec(value).map_err(|e| {
        AppError::new("AI_INDEX_PERSIST_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, &json).map_err(|e| {
        AppError::new("AI_INDEX_PERSIST_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("AI_INDEX_PERSIST_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!("tmp={}; dest={}; err={}", tmp.display(), path.display(), e))
    })
}

fn remove_if_exists(path: &Path) -> Result<(), AppError> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| {
            AppError::new("AI_INDEX_PERSIST_FAILED", "Failed to remove previous index file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
    }
    Ok(())
}

impl VectorStore for JsonVectorStore {
    fn location(&self) -> String {
        self.index_dir().display().to_string()
    }

    fn next_generation(&self) -> Result<u64, AppError> {
        self.ensure_dirs()?;
        let counter: GenerationCounter =
            read_json(&self.generation_path(), "generation counter")?.unwrap_or_default();
        // Indexes written before the counter existed only carry their generation in the status.
        let committed = match self.current() {
            Ok(h) => h.map(|h| h.generation).unwrap_or(0),
            Err(e) => {
                warn!(err = %e, "index status unreadable; using generation counter only");
                0
            }
        };
        let next = counter.last.max(committed) + 1;
        write_json_atomic(
            &self.generation_path(),
            &GenerationCounter { last: next },
            "generation counter",
        )?;
        Ok(next)
    }

    fn count(&self) -> Result<usize, AppError> {
        Ok(self.read_entries()?.len())
    }

    fn current(&self) -> Result<Option<IndexHandle>, AppError> {
        read_json(&self.status_path(), "index status")
    }

    fn reset(&self) -> Result<(), AppError> {
        self.ensure_dirs()?;
        // Status first: once it is gone the index reads as not ready.
        remove_if_exists(&self.status_path())?;
        remove_if_exists(&self.entries_path())?;
        debug!(location = %self.location(), "index reset");
        Ok(())
    }

    fn upsert(&self, entries: &[IndexEntry]) -> Result<(), AppError> {
        self.ensure_dirs()?;
        let mut all = self.read_entries()?;
        let mut positions: HashMap<String, usize> = all
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk.chunk_id.clone(), i))
            .collect();
        for e in entries {
            match positions.get(&e.chunk.chunk_id) {
                Some(&i) => all[i] = e.clone(),
                None => {
                    positions.insert(e.chunk.chunk_id.clone(), all.len());
                    all.push(e.clone());
                }
            }
        }
        write_json_atomic(&self.entries_path(), &all, "index entries")
    }

    fn commit(&self, handle: &IndexHandle) -> Result<(), AppError> {
        self.ensure_dirs()?;
        write_json_atomic(&self.status_path(), handle, "index status")
    }

    fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredEntry>, AppError> {
        let st = self.current()?.ok_or_else(|| {
            AppError::new(
                "AI_INDEX_NOT_READY",
                "Index not ready; process documents before asking questions",
            )
            .with_details(format!("location={}", self.location()))
        })?;
        if vector.len() as u32 != st.dims {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Query embedding dims do not match index dims",
            )
            .with_details(format!("index_dims={}; query_dims={}", st.dims, vector.len())));
        }

        let qnorm = similarity::l2_norm(vector);
        if qnorm == 0.0 {
            return Err(AppError::new(
                "AI_RETRIEVAL_FAILED",
                "Query embedding norm is zero",
            ));
        }

        let mut hits: Vec<ScoredEntry> = Vec::new();
        for entry in self.read_entries()? {
            if entry.vector.len() as u32 != st.dims {
                return Err(AppError::new("AI_RETRIEVAL_FAILED", "Index vector dims mismatch")
                    .with_details(format!(
                        "chunk_id={}; expected={}; got={}",
                        entry.chunk.chunk_id,
                        st.dims,
                        entry.vector.len()
                    )));
            }
            let vnorm = similarity::l2_norm(&entry.vector);
            if vnorm == 0.0 {
                continue;
            }
            let score = similarity::cosine_similarity(vector, &entry.vector, qnorm, vnorm);
            hits.push(ScoredEntry {
                chunk: entry.chunk,
                vector: entry.vector,
                score,
            });
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.chunk.chunk_id.cmp(&b.chunk.chunk_id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}
