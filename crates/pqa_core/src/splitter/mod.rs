use std::collections::VecDeque;
use std::ops::Range;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::SplitterConfig;
use crate::domain::{Chunk, Document};
use crate::error::AppError;

/// Separators tried from coarsest to finest. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter with fixed-size overlapping windows.
///
/// Lengths are measured in characters. A piece that fits is packed into the current window; a
/// piece that does not fit is split again with the next finer separator. Separators stay attached
/// to the start of the piece that follows them, and emitted chunks are whitespace-trimmed.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    cfg: SplitterConfig,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(cfg: SplitterConfig) -> Result<Self, AppError> {
        cfg.validate()?;
        Ok(Self {
            cfg,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split every page of every document, keeping provenance. Ordinals run across pages.
    ///
    /// A document's position in `docs` is part of its chunk ids, so two uploads with the same
    /// name and text still yield distinct chunks.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        let mut out = Vec::new();
        for (doc_index, doc) in docs.iter().enumerate() {
            let mut ordinal: u32 = 0;
            for page in doc.pages.iter() {
                let text = normalize_text(&page.text);
                for span in self.split_spans(&text) {
                    let start_index = text[..span.start].chars().count();
                    let chunk_text = text[span].to_string();
                    let id = chunk_id(doc_index, &doc.name, page.page, ordinal, &chunk_text);
                    out.push(Chunk {
                        chunk_id: id,
                        source: doc.name.clone(),
                        page: page.page,
                        ordinal,
                        start_index,
                        text: chunk_text,
                    });
                    ordinal += 1;
                }
            }
            debug!(source = %doc.name, pages = doc.pages.len(), chunks = ordinal, "split document");
        }
        out
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_spans(text)
            .into_iter()
            .map(|r| text[r].to_string())
            .collect()
    }

    /// Byte ranges of the chunks within `text`.
    fn split_spans(&self, text: &str) -> Vec<Range<usize>> {
        let seps: Vec<&str> = self.separators.iter().map(|s| s.as_str()).collect();
        let mut out = Vec::new();
        self.split_range(text, 0..text.len(), &seps, &mut out);
        out
    }

    fn split_range(
        &self,
        text: &str,
        range: Range<usize>,
        separators: &[&str],
        out: &mut Vec<Range<usize>>,
    ) {
        let piece = &text[range.clone()];

        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, s) in separators.iter().enumerate() {
            if s.is_empty() {
                separator = *s;
                break;
            }
            if piece.contains(*s) {
                separator = *s;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut good: Vec<(Range<usize>, usize)> = Vec::new();
        for r in split_keep_start(piece, separator, range.start) {
            let len = text[r.clone()].chars().count();
            if len < self.cfg.chunk_size {
                good.push((r, len));
                continue;
            }
            if !good.is_empty() {
                self.merge(text, &good, out);
                good.clear();
            }
            if finer.is_empty() {
                push_trimmed(text, r, out);
            } else {
                self.split_range(text, r, finer, out);
            }
        }
        if !good.is_empty() {
            self.merge(text, &good, out);
        }
    }

    /// Pack adjacent pieces into windows of at most `chunk_size` characters, carrying at most
    /// `chunk_overlap` characters from the tail of one window into the next.
    fn merge(&self, text: &str, pieces: &[(Range<usize>, usize)], out: &mut Vec<Range<usize>>) {
        let size = self.cfg.chunk_size;
        let overlap = self.cfg.chunk_overlap;

        let mut current: VecDeque<(Range<usize>, usize)> = VecDeque::new();
        let mut total = 0usize;

        for (r, len) in pieces.iter().cloned() {
            if total + len > size && !current.is_empty() {
                emit_window(text, &current, out);
                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }
            current.push_back((r, len));
            total += len;
        }
        if !current.is_empty() {
            emit_window(text, &current, out);
        }
    }
}

fn emit_window(text: &str, window: &VecDeque<(Range<usize>, usize)>, out: &mut Vec<Range<usize>>) {
    if let (Some(first), Some(last)) = (window.front(), window.back()) {
        push_trimmed(text, first.0.start..last.0.end, out);
    }
}

fn push_trimmed(text: &str, r: Range<usize>, out: &mut Vec<Range<usize>>) {
    let s = &text[r.clone()];
    let lead = s.len() - s.trim_start().len();
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = r.start + lead;
    out.push(start..start + trimmed.len());
}

/// Split `piece` on `sep`, keeping each separator at the start of the following part.
/// Ranges are offset by `base` so they index the full page text. Empty parts are dropped.
fn split_keep_start(piece: &str, sep: &str, base: usize) -> Vec<Range<usize>> {
    if sep.is_empty() {
        return piece
            .char_indices()
            .map(|(i, c)| base + i..base + i + c.len_utf8())
            .collect();
    }
    let mut starts = vec![0usize];
    for (i, _) in piece.match_indices(sep) {
        if i != 0 {
            starts.push(i);
        }
    }
    let mut out = Vec::with_capacity(starts.len());
    for (j, &s) in starts.iter().enumerate() {
        let e = starts.get(j + 1).copied().unwrap_or(piece.len());
        if e > s {
            out.push(base + s..base + e);
        }
    }
    out
}

pub fn normalize_text(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn chunk_id(doc_index: usize, source: &str, page: u32, ordinal: u32, text: &str) -> String {
    let text_sha256 = sha256_hex(text.as_bytes());
    sha256_hex(format!("v2|{doc_index}|{source}|{page}|{ordinal}|{text_sha256}").as_bytes())
}
