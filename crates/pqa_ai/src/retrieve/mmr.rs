//! Maximal marginal relevance selection.
//!
//! Each step picks the candidate maximising
//! `lambda * sim(query, c) - (1 - lambda) * max(sim(c, s) for s in selected)`.
//! The first pick is always the candidate most similar to the query.

use super::similarity::cosine;

/// Indices into `candidates`, in selection order. At most `k` are returned.
pub fn select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    let to_query: Vec<f32> = candidates.iter().map(|c| cosine(query, c)).collect();

    let mut first = 0usize;
    for (i, s) in to_query.iter().enumerate() {
        if *s > to_query[first] {
            first = i;
        }
    }
    let mut selected = vec![first];
    // Best similarity of every candidate to anything selected so far.
    let mut redundancy: Vec<f32> = candidates
        .iter()
        .map(|c| cosine(c, &candidates[first]))
        .collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in to_query.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let score = lambda * rel - (1.0 - lambda) * redundancy[i];
            if best.map_or(true, |(_, b)| score > b) {
                best = Some((i, score));
            }
        }
        let Some((pick, _)) = best else { break };
        selected.push(pick);
        for (i, c) in candidates.iter().enumerate() {
            let s = cosine(c, &candidates[pick]);
            if s > redundancy[i] {
                redundancy[i] = s;
            }
        }
    }
    selected
}
