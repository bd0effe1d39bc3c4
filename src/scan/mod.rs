//! Batch EPD screening of catalog products.

pub mod store;
pub mod table;
pub mod thumbnail;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::{ScanConfig, ScanRiskPolicy};
use crate::error::{Error, Result};
use crate::models::Product;
use crate::risk::{self, certificates, RiskTier};
pub use store::{Scan, ScanCounts, ScanResult, ScanStore};

pub const SCAN_ADVISORY: &str = "Due to missing issue dates (epd_issue_date) in the source data, please manually verify the validity periods of all EPDs.";

const SOURCE: &str = "local_index";

/// Full per-row view returned when a scan is created.
#[derive(Debug, Clone, Serialize)]
pub struct ScanRow {
    pub input_product_id: String,
    pub product_name: Option<String>,
    pub manufacturer_name: Option<String>,
    pub epd_url: Option<String>,
    pub epd_issue_date: Option<String>,
    pub risk_level: RiskTier,
    pub has_epd: bool,
    pub has_certifications: bool,
    pub has_epd_certificate: bool,
    pub certifications: Vec<String>,
    pub certificate_urls: Vec<String>,
    pub categories: Vec<String>,
    pub thumbnail_url: Option<String>,
    pub reasons: Vec<String>,
    pub advisories: Vec<String>,
}

impl ScanRow {
    fn snapshot(&self) -> ScanResult {
        ScanResult {
            input_product_id: self.input_product_id.clone(),
            product_name: self.product_name.clone(),
            manufacturer_name: self.manufacturer_name.clone(),
            epd_url: self.epd_url.clone(),
            epd_issue_date: self.epd_issue_date.clone(),
            risk_level: self.risk_level,
            reasons: self.reasons.clone(),
            advisories: self.advisories.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub scan_id: Uuid,
    pub created_at: String,
    pub counts: ScanCounts,
    pub advisory: &'static str,
}

impl ScanSummary {
    pub fn of(scan: &Scan) -> Self {
        Self {
            scan_id: scan.scan_id,
            created_at: scan.created_at.to_rfc3339(),
            counts: scan.counts,
            advisory: SCAN_ADVISORY,
        }
    }
}

/// Trim, drop blanks, keep the first `max_ids`. An empty list is rejected.
pub fn normalize_ids<I, S>(raw: I, max_ids: usize) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let ids: Vec<String> = raw
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .take(max_ids)
        .collect();
    if ids.is_empty() {
        return Err(Error::Validation(
            "Missing product IDs (CSV or JSON: product_ids)".to_string(),
        ));
    }
    Ok(ids)
}

/// Classify one input id. Unknown ids evaluate as an empty product.
pub fn evaluate_row(input_id: &str, product: Option<&Product>, policy: ScanRiskPolicy) -> ScanRow {
    let empty = Product::default();
    let product = product.unwrap_or(&empty);

    let assessment = risk::evaluate_product(product);
    let state = certificates::detect(product);
    let risk_level = match policy {
        ScanRiskPolicy::Certificates => state.tier(),
        ScanRiskPolicy::Rules => assessment.tier,
    };

    ScanRow {
        input_product_id: input_id.to_string(),
        product_name: product.display_name().map(str::to_string),
        manufacturer_name: product.display_manufacturer().map(str::to_string),
        epd_url: product.epd_url.clone(),
        epd_issue_date: product.epd_issue_date.clone(),
        risk_level,
        has_epd: product.epd_url.as_deref().is_some_and(|u| !u.trim().is_empty()),
        has_certifications: state.has_any,
        has_epd_certificate: state.has_epd,
        certifications: product.certification_names().map(str::to_string).collect(),
        certificate_urls: certificates::certificate_urls(product),
        categories: product.category_names().map(str::to_string).collect(),
        thumbnail_url: thumbnail::thumbnail_url(product),
        reasons: assessment.reasons,
        advisories: assessment.advisories,
    }
}

/// Evaluate `ids` against the catalog, producing the stored scan and the
/// detailed rows.
pub fn run_scan(catalog: &Catalog, ids: &[String], config: &ScanConfig) -> (Scan, Vec<ScanRow>) {
    let ids = &ids[..ids.len().min(config.max_ids)];

    let rows: Vec<ScanRow> = ids
        .iter()
        .map(|id| evaluate_row(id, catalog.find_by_any_id(id), config.risk_policy))
        .collect();

    let mut counts = ScanCounts {
        total: rows.len(),
        ..ScanCounts::default()
    };
    for row in &rows {
        match row.risk_level {
            RiskTier::Red => counts.high += 1,
            RiskTier::Yellow => counts.medium += 1,
            RiskTier::Green => counts.low += 1,
        }
    }

    let scan = Scan {
        scan_id: Uuid::new_v4(),
        created_at: Utc::now(),
        source: SOURCE.to_string(),
        counts,
        results: rows.iter().map(ScanRow::snapshot).collect(),
    };
    tracing::info!(
        "Scan {} evaluated {} products ({} high, {} medium, {} low)",
        scan.scan_id,
        counts.total,
        counts.high,
        counts.medium,
        counts.low
    );
    (scan, rows)
}
