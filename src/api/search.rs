use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{SearchRequest, SearchResponse};
use crate::search::paginate::{clamp_params, paginate, Page};
use crate::state::AppState;

/// POST /api/search - semantic retrieval plus optional LLM refinement.
/// An empty query lists the filtered catalog instead.
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Response> {
    let Json(req) = payload?;
    let query = req.query.trim().to_string();
    let filters = req.filters.as_ref().filter(|f| !f.is_empty());
    let (page, per_page) = clamp_params(req.page, req.per_page);

    if query.is_empty() {
        let products: Vec<_> = state
            .catalog
            .list_filtered(filters, None)
            .into_iter()
            .cloned()
            .collect();
        return Ok(page_response(query, paginate(products, page, per_page)));
    }

    let results = match state
        .engine
        .search(&query, filters, req.use_llm_refinement)
        .await
    {
        Ok(results) => results,
        Err(Error::EmbeddingUnavailable(e)) => {
            tracing::warn!("Semantic search unavailable: {e}");
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    Ok(page_response(query, paginate(results, page, per_page)))
}

fn page_response<T: Serialize>(query: String, page: Page<T>) -> Response {
    Json(SearchResponse {
        success: true,
        query,
        count: page.items.len(),
        results: page.items,
        total: page.total,
        page: page.page,
        per_page: page.per_page,
        total_pages: page.total_pages,
    })
    .into_response()
}
