//! Maximal Marginal Relevance over a candidate pool.
//!
//! MMR = λ × sim(query, doc) − (1 − λ) × max(sim(doc, selected))
//!
//! λ = 1.0 is pure relevance, λ = 0.0 pure diversity.

pub(crate) fn magnitude(v: &[f32]) -> f32 { v.iter().map(|x| x * x).sum::<f32>().sqrt() }

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	let denom = magnitude(a) * magnitude(b);
	if denom <= f32::EPSILON {
		return 0.0;
	}
	a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / denom
}

/// Picks up to `k` candidate indices in selection order. `candidates` must be
/// sorted nearest-first: score ties keep the earlier (nearer) candidate.
pub(crate) fn mmr_select(query: &[f32], candidates: &[Vec<f32>], k: usize, lambda: f32) -> Vec<usize> {
	let k = k.min(candidates.len());
	let relevance: Vec<f32> = candidates.iter().map(|c| cosine_similarity(query, c)).collect();
	let mut selected: Vec<usize> = Vec::with_capacity(k);
	let mut remaining: Vec<usize> = (0..candidates.len()).collect();

	while selected.len() < k {
		let mut best_pos = 0;
		let mut best_mmr = f32::NEG_INFINITY;
		for (pos, &idx) in remaining.iter().enumerate() {
			let redundancy = selected
				.iter()
				.map(|&s| cosine_similarity(&candidates[idx], &candidates[s]))
				.fold(f32::NEG_INFINITY, f32::max);
			let redundancy = if selected.is_empty() { 0.0 } else { redundancy };
			let mmr = lambda * relevance[idx] - (1.0 - lambda) * redundancy;
			if mmr > best_mmr {
				best_mmr = mmr;
				best_pos = pos;
			}
		}
		selected.push(remaining.remove(best_pos));
	}
	selected
}
