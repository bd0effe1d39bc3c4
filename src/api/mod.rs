//! Axum handlers. Each handler is a thin shell over the library services;
//! failures convert through [`crate::error::Error`]'s `IntoResponse`.

pub mod assess;
pub mod chat;
pub mod epd;
pub mod products;
pub mod search;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", post(search::search))
        .route("/api/chat", post(chat::chat))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/product", get(products::get_product_flexible))
        .route("/api/similar/{id}", get(products::similar_products))
        .route("/api/filters", get(products::get_filters))
        .route("/api/certifications", get(products::get_certifications))
        .route("/api/stats", get(products::get_stats))
        .route("/api/health", get(products::health))
        .route("/api/assess-products", post(assess::assess_products))
        .route("/api/epd/scan", post(epd::create_scan))
        .route("/api/epd/scan/{id}", get(epd::get_scan))
        .route("/api/epd/export/{id}", get(epd::export_scan))
        .with_state(state)
}
