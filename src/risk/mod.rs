//! EPD risk classification.
//!
//! [`evaluate`] is the URL/issue-date decision tree applied to single
//! products. [`certificates`] holds the certificate-presence heuristic used
//! for batch scans. Both are pure.

pub mod certificates;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::Product;

pub const MISSING_LINK: &str = "Missing EPD file link";
pub const RELATIVE_NO_DATE: &str = "EPD link is relative and issue date is missing";
pub const RELATIVE_PATH: &str = "EPD link is a relative path and may be inaccessible";
pub const NO_ISSUE_DATE: &str = "EPD issue date is missing; validity cannot be verified";
pub const ACCESSIBLE: &str = "EPD link is accessible; please verify the issue date manually";
pub const VERIFY_ADVISORY: &str = "Please manually verify the validity period of all EPDs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Red,
    Yellow,
    Green,
}

impl RiskTier {
    /// Label used in scan rows and exports.
    pub fn label(self) -> &'static str {
        match self {
            RiskTier::Red => "Red",
            RiskTier::Yellow => "Yellow",
            RiskTier::Green => "Green",
        }
    }

    pub fn lowercase(self) -> &'static str {
        match self {
            RiskTier::Red => "red",
            RiskTier::Yellow => "yellow",
            RiskTier::Green => "green",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskAssessment {
    pub tier: RiskTier,
    pub reasons: Vec<String>,
    pub advisories: Vec<String>,
}

fn is_absolute_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    lowered.starts_with("http://") || lowered.starts_with("https://")
}

fn present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// First matching branch wins. Every outcome carries the manual-verification
/// advisory.
pub fn evaluate(epd_url: Option<&str>, epd_issue_date: Option<&str>) -> RiskAssessment {
    let (tier, reason) = match epd_url.filter(|u| !u.trim().is_empty()) {
        None => (RiskTier::Red, MISSING_LINK),
        Some(url) => match (is_absolute_url(url), present(epd_issue_date)) {
            (false, false) => (RiskTier::Yellow, RELATIVE_NO_DATE),
            (false, true) => (RiskTier::Yellow, RELATIVE_PATH),
            (true, false) => (RiskTier::Yellow, NO_ISSUE_DATE),
            (true, true) => (RiskTier::Green, ACCESSIBLE),
        },
    };

    RiskAssessment {
        tier,
        reasons: vec![reason.to_string()],
        advisories: vec![VERIFY_ADVISORY.to_string()],
    }
}

pub fn evaluate_product(product: &Product) -> RiskAssessment {
    evaluate(
        product.epd_url.as_deref(),
        product.epd_issue_date.as_deref(),
    )
}
