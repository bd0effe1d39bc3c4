use serde::Deserialize;
use std::collections::HashMap;

use super::ChatProvider;
use crate::error::{Error, Result};
use crate::models::{de, ChatMessage, ScoredProduct};

const SYSTEM_PROMPT: &str = "You are a product recommendation expert for building materials.";

/// One entry of the model's JSON answer.
#[derive(Debug, Clone, Deserialize)]
pub struct Recommendation {
    /// Numeric or string; compared by string form.
    pub product_id: serde_json::Value,
    #[serde(default, deserialize_with = "de::opt_u32")]
    pub rank: Option<u32>,
    #[serde(default, deserialize_with = "de::opt_f32")]
    pub relevance_score: Option<f32>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub explanation: Option<String>,
}

impl Recommendation {
    fn id_key(&self) -> String {
        match &self.product_id {
            serde_json::Value::String(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }
}

/// Re-order `candidates` with a generative pass.
///
/// Returns an error on any provider or parsing failure; callers pair it with
/// [`fallback`] so refinement never surfaces to the client.
pub async fn refine(
    provider: &dyn ChatProvider,
    query: &str,
    candidates: &[ScoredProduct],
    top_k_final: usize,
    max_tokens: u32,
) -> Result<Vec<ScoredProduct>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let messages = vec![
        ChatMessage::new("system", SYSTEM_PROMPT),
        ChatMessage::new("user", build_refinement_prompt(query, candidates)),
    ];
    let reply = provider.complete(&messages, max_tokens).await?;
    let recommendations = parse_recommendations(&reply)?;
    apply(candidates, &recommendations, top_k_final)
}

/// The similarity-ordered head of the candidate list.
pub fn fallback(candidates: &[ScoredProduct], top_k_final: usize) -> Vec<ScoredProduct> {
    candidates.iter().take(top_k_final).cloned().collect()
}

pub fn build_refinement_prompt(query: &str, candidates: &[ScoredProduct]) -> String {
    let mut products_text = String::new();
    for (i, scored) in candidates.iter().enumerate() {
        let p = &scored.product;
        products_text.push_str(&format!(
            "\n{}. [Product ID: {}] {} - {}\n",
            i + 1,
            p.id,
            p.manufacturer_name.as_deref().unwrap_or("Unknown"),
            p.product_name.as_deref().unwrap_or("Unknown"),
        ));
        if let Some(desc) = &p.product_description {
            products_text.push_str(&format!("   Description: {desc}\n"));
        }
        let categories: Vec<&str> = p.category_names().collect();
        if !categories.is_empty() {
            products_text.push_str(&format!("   Categories: {}\n", categories.join(", ")));
        }
        if p.has_certifications() {
            products_text.push_str(&format!(
                "   Certifications: {} certification(s)\n",
                p.certifications.len()
            ));
        }
        if let Some(price) = &p.price_adjustment_structure {
            products_text.push_str(&format!("   Price: {price}\n"));
        }
        products_text.push_str(&format!(
            "   Similarity Score: {:.3}\n",
            scored.similarity_score
        ));
    }

    format!(
        r#"You are an expert product recommendation system for architectural and building materials.

User Query: "{query}"

I've found {count} potentially relevant products using semantic search. Your task is to:
1. Analyze which products best match the user's intent and requirements
2. Rank them by relevance (most relevant first)
3. Provide a brief explanation for each recommended product

Products found:
{products_text}

Respond with a JSON array of recommended products in this exact format:
[
  {{
    "product_id": <USE THE ACTUAL PRODUCT ID FROM [Product ID: X] ABOVE>,
    "rank": 1,
    "relevance_score": 0.95,
    "explanation": "Brief explanation of why this product matches the query"
  }},
  ...
]

IMPORTANT: Use the exact Product ID numbers shown in [Product ID: X] format above. Do not use sequential numbers.
Only include products that are actually relevant to the query. Return between 5-10 products maximum.
Respond ONLY with the JSON array, no other text."#,
        count = candidates.len(),
    )
}

/// Parse the model reply, tolerating a ```json fence around the array.
pub fn parse_recommendations(text: &str) -> Result<Vec<Recommendation>> {
    let mut content = text.trim();
    if content.starts_with("```") {
        if let Some(inner) = content.split("```").nth(1) {
            content = inner.strip_prefix("json").unwrap_or(inner).trim();
        }
    }

    serde_json::from_str(content).map_err(|e| {
        let preview: String = content.chars().take(200).collect();
        Error::Refinement(format!("Unparseable refinement reply ({e}): {preview}"))
    })
}

/// Map recommendations back onto the candidates. Ids the model invented are
/// dropped; an empty mapping is an error.
pub fn apply(
    candidates: &[ScoredProduct],
    recommendations: &[Recommendation],
    top_k_final: usize,
) -> Result<Vec<ScoredProduct>> {
    let by_id: HashMap<String, &ScoredProduct> =
        candidates.iter().map(|c| (c.id().key(), c)).collect();

    let mut refined = Vec::new();
    for rec in recommendations {
        let key = rec.id_key();
        match by_id.get(&key) {
            Some(candidate) => {
                let mut product = (*candidate).clone();
                product.llm_rank = Some(rec.rank.unwrap_or(0));
                product.llm_relevance = Some(rec.relevance_score.unwrap_or(0.0));
                product.llm_explanation = Some(rec.explanation.clone().unwrap_or_default());
                refined.push(product);
            }
            None => {
                tracing::warn!("Refinement returned product_id {key} not in the semantic results");
            }
        }
    }

    if refined.is_empty() {
        return Err(Error::Refinement(
            "Refinement produced no valid products".to_string(),
        ));
    }
    refined.truncate(top_k_final);
    Ok(refined)
}
