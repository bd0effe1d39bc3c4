use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Product;
use crate::risk::{self, RiskTier};

#[derive(Debug, Deserialize)]
pub struct AssessRequest {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessedProduct {
    pub product_id: String,
    pub product_name: Option<String>,
    pub manufacturer: Option<String>,
    pub has_epd: bool,
    pub epd_url: Option<String>,
    pub has_issue_date: bool,
    pub risk_level: &'static str,
    pub risk_reason: String,
    #[serde(skip)]
    tier: RiskTier,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct AssessSummary {
    pub total: usize,
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
}

#[derive(Debug, Serialize)]
pub struct AssessResponse {
    pub success: bool,
    pub products: Vec<AssessedProduct>,
    pub summary: AssessSummary,
}

fn assess_one(mut product: Product) -> AssessedProduct {
    product.normalize();
    let assessment = risk::evaluate_product(&product);

    let product_id = match product.id.key() {
        key if key.is_empty() => product.product_id.clone().unwrap_or_default(),
        key => key,
    };

    AssessedProduct {
        product_id,
        product_name: product.display_name().map(str::to_string),
        manufacturer: product.display_manufacturer().map(str::to_string),
        has_epd: product.epd_url.is_some(),
        has_issue_date: product.epd_issue_date.is_some(),
        epd_url: product.epd_url,
        risk_level: assessment.tier.lowercase(),
        risk_reason: assessment.reasons.join("; "),
        tier: assessment.tier,
    }
}

/// Rule-engine assessment of caller-supplied records. Rows come back red
/// first, products without an EPD link ahead of the rest within a tier,
/// then by lowercase name.
pub fn assess(products: Vec<Product>) -> AssessResponse {
    let mut rows: Vec<AssessedProduct> = products.into_iter().map(assess_one).collect();

    rows.sort_by_cached_key(|row| {
        (
            row.tier,
            row.has_epd,
            row.product_name.as_deref().unwrap_or_default().to_lowercase(),
        )
    });

    let mut summary = AssessSummary {
        total: rows.len(),
        ..AssessSummary::default()
    };
    for row in &rows {
        match row.tier {
            RiskTier::Red => summary.red += 1,
            RiskTier::Yellow => summary.yellow += 1,
            RiskTier::Green => summary.green += 1,
        }
    }

    AssessResponse {
        success: true,
        products: rows,
        summary,
    }
}

/// POST /api/assess-products
pub async fn assess_products(
    payload: Result<Json<AssessRequest>, JsonRejection>,
) -> Result<Json<AssessResponse>> {
    let Json(req) = payload?;
    tracing::info!("Assessing {} products", req.products.len());
    Ok(Json(assess(req.products)))
}
