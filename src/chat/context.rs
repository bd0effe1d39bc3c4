use regex::Regex;
use std::sync::LazyLock;

use crate::catalog::Catalog;
use crate::models::{ChatMessage, ScoredProduct};

/// Turns scanned for previously mentioned products.
pub const HISTORY_WINDOW: usize = 6;

const FOLLOW_UP_KEYWORDS: &[&str] = &[
    "pricing",
    "price",
    "cost",
    "ballpark",
    "tell me more",
    "compare",
    "difference",
    "which one",
    "suggestions",
    "recommendations",
    "you mentioned",
    "you suggested",
    "above",
    "these",
    "those",
];

static PRODUCT_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(ID:\s*(\d+)\)").unwrap());

/// The last [`HISTORY_WINDOW`] turns.
pub fn recent(history: &[ChatMessage]) -> &[ChatMessage] {
    &history[history.len().saturating_sub(HISTORY_WINDOW)..]
}

/// Ids cited as `(ID: 123)` by the assistant in recent turns, first mention
/// first, without duplicates.
pub fn extract_history_ids(history: &[ChatMessage]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for msg in recent(history).iter().filter(|m| m.role == "assistant") {
        for cap in PRODUCT_ID_RE.captures_iter(&msg.content) {
            let id = cap[1].to_string();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

pub fn is_follow_up(query: &str) -> bool {
    let query = query.to_lowercase();
    FOLLOW_UP_KEYWORDS.iter().any(|k| query.contains(k))
}

/// Prepend previously discussed products to fresh results on follow-up turns,
/// then cut back to `max_products`. Carried products may evict fresh ones.
pub fn merge_context(
    catalog: &Catalog,
    query: &str,
    history: &[ChatMessage],
    mut products: Vec<ScoredProduct>,
    max_products: usize,
) -> Vec<ScoredProduct> {
    if !is_follow_up(query) {
        return products;
    }
    let ids = extract_history_ids(history);
    if ids.is_empty() {
        return products;
    }

    let present: Vec<String> = products.iter().map(|p| p.id().key()).collect();
    let mut carried = 0;
    for previous in catalog.get_by_ids(&ids) {
        if !present.contains(&previous.id.key()) {
            products.insert(0, ScoredProduct::new(previous.clone(), 0.0));
            carried += 1;
        }
    }
    if carried > 0 {
        tracing::info!("Carried {carried} products over from the conversation");
    }

    products.truncate(max_products);
    products
}
