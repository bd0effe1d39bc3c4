//! Product text rendering, batch embedding generation and the on-disk
//! embedding cache.
//!
//! Vectors are positional: vector `i` belongs to product `i` of the catalog
//! that produced it. The cache records the product count it was built for and
//! is ignored when that count no longer matches.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::llm::EmbeddingProvider;
use crate::models::Product;

/// Render the searchable features of a product as one line of text.
pub fn embedding_text(product: &Product) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(m) = &product.manufacturer_name {
        parts.push(format!("Manufacturer: {m}"));
    }
    if let Some(n) = &product.product_name {
        parts.push(format!("Product: {n}"));
    }
    if let Some(c) = &product.product_code {
        parts.push(format!("Code: {c}"));
    }
    if let Some(d) = &product.product_description {
        parts.push(format!("Description: {d}"));
    }

    let categories: Vec<&str> = product.category_names().collect();
    if !categories.is_empty() {
        parts.push(format!("Categories: {}", categories.join(", ")));
    }

    let mut sustainability = Vec::new();
    let certs: Vec<&str> = product.certification_names().collect();
    if !certs.is_empty() {
        sustainability.push(format!("Certifications: {}", certs.join(", ")));
    }
    if let Some(v) = product.recycled_content_percentage.filter(|v| *v != 0.0) {
        sustainability.push(format!("Recycled content: {v}%"));
    }
    if let Some(v) = product.recyclable_percentage.filter(|v| *v != 0.0) {
        sustainability.push(format!("Recyclable: {v}%"));
    }
    if product.carbon_neutral == Some(true) {
        sustainability.push("Carbon neutral".to_string());
    }
    if let Some(v) = product.net_carbon_emissions.filter(|v| *v != 0.0) {
        sustainability.push(format!("Carbon emissions: {v} kg CO2e"));
    }
    if !sustainability.is_empty() {
        parts.push(format!("Sustainability: {}", sustainability.join("; ")));
    }

    let mut technical = Vec::new();
    if let Some(d) = &product.standard_dimensions {
        technical.push(format!("Dimensions: {d}"));
    }
    if let Some(y) = &product.expected_lifespan_years {
        technical.push(format!("Lifespan: {y} years"));
    }
    if let Some(y) = &product.manufacturers_warranty_years {
        technical.push(format!("Warranty: {y} years"));
    }
    if !technical.is_empty() {
        parts.push(format!("Technical: {}", technical.join("; ")));
    }

    let mut commercial = Vec::new();
    if let Some(p) = product.price() {
        commercial.push(format!("Price: {p}"));
    }
    if let Some(l) = &product.lead_time {
        commercial.push(format!("Lead time: {l}"));
    }
    if !commercial.is_empty() {
        parts.push(format!("Commercial: {}", commercial.join("; ")));
    }

    let mut safety = Vec::new();
    if let Some(voc) = &product.volatile_organic_compounds {
        safety.push(format!("VOC: {voc}"));
    }
    if product.substances_of_concern.as_deref() == Some("No") {
        safety.push("No substances of concern".to_string());
    }
    if !safety.is_empty() {
        parts.push(format!("Safety: {}", safety.join("; ")));
    }

    parts.join(" | ")
}

#[derive(Serialize, Deserialize)]
struct EmbeddingCache {
    product_count: usize,
    embeddings: Vec<Vec<f32>>,
}

/// Load cached vectors if they were built for exactly `product_count` products.
pub fn load_cache(path: &Path, product_count: usize) -> Option<Vec<Vec<f32>>> {
    if !path.exists() {
        return None;
    }
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) => {
            tracing::warn!("Failed to read embedding cache {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str::<EmbeddingCache>(&data) {
        Ok(cache)
            if cache.product_count == product_count
                && cache.embeddings.len() == product_count =>
        {
            Some(cache.embeddings)
        }
        Ok(cache) => {
            tracing::info!(
                "Embedding cache holds {} vectors for {} products; regenerating",
                cache.embeddings.len(),
                product_count
            );
            None
        }
        Err(e) => {
            tracing::warn!("Failed to parse embedding cache: {e}");
            None
        }
    }
}

/// Write the cache atomically (temp file + rename).
pub fn save_cache(path: &Path, embeddings: &[Vec<f32>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string(&EmbeddingCache {
        product_count: embeddings.len(),
        embeddings: embeddings.to_vec(),
    })?;
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Embed every product, one batch at a time. Either all vectors come back or
/// the call fails; partial runs are never cached.
pub async fn generate(
    provider: &dyn EmbeddingProvider,
    products: &[Product],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut all = Vec::with_capacity(products.len());

    tracing::info!("Generating embeddings for {} products", products.len());
    for batch in products.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(embedding_text).collect();
        let vectors = provider.embed(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        all.extend(vectors);
        tracing::info!("  Generated {}/{} embeddings", all.len(), products.len());
    }

    Ok(all)
}

/// Cached vectors when valid, otherwise a fresh run (cached afterwards when a
/// cache path is given).
pub async fn load_or_generate(
    provider: &dyn EmbeddingProvider,
    products: &[Product],
    batch_size: usize,
    cache_path: Option<&Path>,
) -> Result<Vec<Vec<f32>>> {
    if let Some(path) = cache_path {
        if let Some(cached) = load_cache(path, products.len()) {
            tracing::info!("Loaded {} embeddings from cache", cached.len());
            return Ok(cached);
        }
    }

    let embeddings = generate(provider, products, batch_size).await?;

    if let Some(path) = cache_path {
        match save_cache(path, &embeddings) {
            Ok(()) => tracing::info!("Cached embeddings to {}", path.display()),
            Err(e) => tracing::warn!("Failed to write embedding cache: {e}"),
        }
    }
    Ok(embeddings)
}
