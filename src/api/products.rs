use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::catalog::{CatalogStats, FilterOptions};
use crate::error::{Error, Result};
use crate::models::{Product, SearchFilters};
use crate::state::AppState;

const DEFAULT_LIST_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Comma-separated category names
    pub categories: Option<String>,
    /// Comma-separated manufacturer names
    pub manufacturers: Option<String>,
    pub has_certifications: Option<String>,
    pub has_carbon_data: Option<String>,
    pub limit: Option<usize>,
}

impl ListParams {
    fn filters(&self) -> SearchFilters {
        let split = |raw: &Option<String>| -> Vec<String> {
            raw.as_deref()
                .filter(|s| !s.is_empty())
                .map(|s| s.split(',').map(str::to_string).collect())
                .unwrap_or_default()
        };
        SearchFilters {
            categories: split(&self.categories),
            manufacturers: split(&self.manufacturers),
            certifications: Vec::new(),
            has_certifications: self.has_certifications.as_deref() == Some("true"),
            has_carbon_data: self.has_carbon_data.as_deref() == Some("true"),
        }
    }
}

/// GET /api/products - filtered catalog listing, catalog order.
pub async fn list_products(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<Value> {
    let filters = params.filters();
    let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
    let results = state.catalog.list_filtered(Some(&filters), Some(limit));

    Json(json!({
        "success": true,
        "count": results.len(),
        "results": results,
        "total": state.catalog.len(),
    }))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>> {
    Ok(Json(state.catalog.get_by_id(&id)?.clone()))
}

#[derive(Debug, Deserialize)]
pub struct FlexibleIdParams {
    #[serde(default)]
    pub id: String,
}

/// GET /api/product?id= - lookup across id, product_id, sku and code.
pub async fn get_product_flexible(
    State(state): State<AppState>,
    Query(params): Query<FlexibleIdParams>,
) -> Result<Json<Product>> {
    let raw = params.id.trim();
    if raw.is_empty() {
        return Err(Error::Validation("Missing id".to_string()));
    }
    state
        .catalog
        .find_by_any_id(raw)
        .cloned()
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("Product {raw}")))
}

/// GET /api/similar/{id}
pub async fn similar_products(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let similar = state.engine.similar(&id).await?;
    Ok(Json(json!({
        "product_id": id,
        "count": similar.len(),
        "similar_products": similar,
    })))
}

/// GET /api/filters
pub async fn get_filters(State(state): State<AppState>) -> Json<FilterOptions> {
    Json(state.catalog.filter_options())
}

/// GET /api/certifications - distinct certification names, sorted.
pub async fn get_certifications(State(state): State<AppState>) -> Json<Value> {
    let names: Vec<&String> = state.catalog.filter_index().certifications.iter().collect();
    Json(json!({ "count": names.len(), "names": names }))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<CatalogStats> {
    Json(state.catalog.statistics())
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "products_loaded": state.catalog.len(),
        "embeddings_ready": state.catalog.embeddings().is_some(),
        "api_configured": state.config.llm.is_configured(),
    }))
}
