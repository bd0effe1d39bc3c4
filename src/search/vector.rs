use crate::catalog::Catalog;
use crate::models::{ScoredProduct, SearchFilters};

/// Rank the whole catalog against `query_embedding`.
///
/// Every product is scored first and sorted by similarity descending; only
/// then are the threshold and filters applied in score order, stopping once
/// `top_k` products qualify. The result is therefore the highest-scoring
/// eligible subset.
pub fn rank(
    catalog: &Catalog,
    embeddings: &[Vec<f32>],
    query_embedding: &[f32],
    filters: Option<&SearchFilters>,
    top_k: usize,
    min_similarity: f32,
) -> Vec<ScoredProduct> {
    let mut scored: Vec<(usize, f32)> = embeddings
        .iter()
        .enumerate()
        .map(|(i, e)| (i, cosine_similarity(query_embedding, e)))
        .collect();

    // Sort descending by score; stable, so ties keep catalog order
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let products = catalog.products();
    let filters = filters.filter(|f| !f.is_empty());

    scored
        .into_iter()
        .filter(|(_, score)| *score >= min_similarity)
        .filter_map(|(i, score)| products.get(i).map(|p| (p, score)))
        .filter(|(p, _)| filters.map_or(true, |f| f.passes(p)))
        .take(top_k)
        .map(|(p, score)| ScoredProduct::new(p.clone(), score))
        .collect()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
