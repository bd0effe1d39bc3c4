use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Product identifier as found in the catalog: numeric or string.
/// Two ids are equal when their string forms are equal.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProductId {
    Num(i64),
    Text(String),
}

impl Default for ProductId {
    fn default() -> Self {
        ProductId::Text(String::new())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductId::Num(n) => write!(f, "{n}"),
            ProductId::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl ProductId {
    pub fn key(&self) -> String {
        self.to_string()
    }

    pub fn matches(&self, raw: &str) -> bool {
        let raw = raw.trim();
        !raw.is_empty() && self.key() == raw
    }
}

impl PartialEq for ProductId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ProductId {}

/// Integral floats (`12.0`) collapse to `Num`; `null` gives the empty id;
/// anything else keeps its JSON text.
impl<'de> Deserialize<'de> for ProductId {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        use serde_json::Value;

        Ok(match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => ProductId::default(),
            Some(Value::String(s)) => ProductId::Text(s),
            Some(Value::Number(n)) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ProductId::Num(i),
                (None, Some(f)) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    ProductId::Num(f as i64)
                }
                _ => ProductId::Text(n.to_string()),
            },
            Some(other) => ProductId::Text(other.to_string()),
        })
    }
}

impl From<i64> for ProductId {
    fn from(n: i64) -> Self {
        ProductId::Num(n)
    }
}

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        ProductId::Text(s.to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Category {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub category_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
}

impl Category {
    pub fn label(&self) -> Option<&str> {
        self.category_name.as_deref().or(self.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Certification {
    #[serde(default, deserialize_with = "de::opt_string")]
    pub certification: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub link: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub certificate_url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Certification {
    pub fn label(&self) -> Option<&str> {
        self.certification.as_deref().or(self.name.as_deref())
    }
}

/// A catalog product.
///
/// Every attribute except `id` is optional. Text attributes accept strings,
/// numbers or booleans; blank values collapse to `None` in [`Product::normalize`],
/// which the catalog calls once at load time. Numeric sustainability
/// attributes accept numbers or numeric strings. Unknown attributes are kept
/// in `extra` and serialized back out unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: ProductId,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub sku: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub code: Option<String>,

    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub manufacturer_name: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub manufacturer: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_code: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub product_description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub long_description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub notes: Option<String>,

    #[serde(default, deserialize_with = "de::list")]
    pub product_categories: Vec<Category>,
    #[serde(default, deserialize_with = "de::list")]
    pub certifications: Vec<Certification>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub certifications_text: Option<String>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub has_certifications: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub certificate_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub certification_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub green_tag_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub greentag_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub hpd_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub hpd_certificate_url: Option<String>,

    #[serde(default, deserialize_with = "de::opt_string")]
    pub epd_url: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub epd_issue_date: Option<String>,

    #[serde(default, deserialize_with = "de::opt_number")]
    pub recycled_content_percentage: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub recyclable_percentage: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_bool")]
    pub carbon_neutral: Option<bool>,
    #[serde(default, deserialize_with = "de::opt_number")]
    pub net_carbon_emissions: Option<f64>,

    #[serde(default, deserialize_with = "de::opt_string")]
    pub standard_dimensions: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub expected_lifespan_years: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub manufacturers_warranty_years: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub price_adjustment_structure: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub price_per_unit: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub lead_time: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub volatile_organic_compounds: Option<String>,
    #[serde(default, deserialize_with = "de::opt_string")]
    pub substances_of_concern: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn blank_to_none(field: &mut Option<String>) {
    if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
        *field = None;
    }
}

impl Product {
    /// Collapse blank text attributes and zero-length names to `None`.
    pub fn normalize(&mut self) {
        for field in [
            &mut self.product_id,
            &mut self.sku,
            &mut self.code,
            &mut self.product_name,
            &mut self.name,
            &mut self.manufacturer_name,
            &mut self.manufacturer,
            &mut self.product_code,
            &mut self.product_description,
            &mut self.long_description,
            &mut self.description,
            &mut self.title,
            &mut self.notes,
            &mut self.certifications_text,
            &mut self.certificate_url,
            &mut self.certification_url,
            &mut self.green_tag_url,
            &mut self.greentag_url,
            &mut self.hpd_url,
            &mut self.hpd_certificate_url,
            &mut self.epd_url,
            &mut self.epd_issue_date,
            &mut self.standard_dimensions,
            &mut self.expected_lifespan_years,
            &mut self.manufacturers_warranty_years,
            &mut self.price_adjustment_structure,
            &mut self.price_per_unit,
            &mut self.lead_time,
            &mut self.volatile_organic_compounds,
            &mut self.substances_of_concern,
        ] {
            blank_to_none(field);
        }
        for cat in &mut self.product_categories {
            blank_to_none(&mut cat.category_name);
            blank_to_none(&mut cat.name);
        }
        for cert in &mut self.certifications {
            blank_to_none(&mut cert.certification);
            blank_to_none(&mut cert.name);
        }
    }

    /// Display name, falling back to the generic `name` attribute.
    pub fn display_name(&self) -> Option<&str> {
        self.product_name.as_deref().or(self.name.as_deref())
    }

    pub fn display_manufacturer(&self) -> Option<&str> {
        self.manufacturer_name
            .as_deref()
            .or(self.manufacturer.as_deref())
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.product_categories.iter().filter_map(Category::label)
    }

    pub fn certification_names(&self) -> impl Iterator<Item = &str> {
        self.certifications.iter().filter_map(Certification::label)
    }

    pub fn has_certifications(&self) -> bool {
        !self.certifications.is_empty()
    }

    pub fn has_carbon_data(&self) -> bool {
        self.net_carbon_emissions.is_some_and(|v| v != 0.0)
    }

    pub fn has_recycled_content(&self) -> bool {
        self.recycled_content_percentage.is_some_and(|v| v != 0.0)
    }

    /// Price text: the adjustment structure wins over the unit price.
    pub fn price(&self) -> Option<&str> {
        self.price_adjustment_structure
            .as_deref()
            .or(self.price_per_unit.as_deref())
    }

    /// Matches `raw` against `id`, `product_id`, `sku` and `code`.
    pub fn matches_any_id(&self, raw: &str) -> bool {
        let raw = raw.trim();
        if raw.is_empty() {
            return false;
        }
        self.id.matches(raw)
            || [&self.product_id, &self.sku, &self.code]
                .into_iter()
                .any(|f| f.as_deref().map(str::trim) == Some(raw))
    }
}

/// A product augmented with per-query ranking data. Never written back to
/// the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredProduct {
    #[serde(flatten)]
    pub product: Product,
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_relevance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_explanation: Option<String>,
}

impl ScoredProduct {
    pub fn new(product: Product, similarity_score: f32) -> Self {
        Self {
            product,
            similarity_score,
            llm_rank: None,
            llm_relevance: None,
            llm_explanation: None,
        }
    }

    pub fn id(&self) -> &ProductId {
        &self.product.id
    }
}

/// Attribute filters. All populated filters must pass; list filters pass on
/// any match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub manufacturers: Vec<String>,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub has_certifications: bool,
    #[serde(default)]
    pub has_carbon_data: bool,
}

/// Search request
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    #[serde(default = "default_true")]
    pub use_llm_refinement: bool,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
}

fn default_true() -> bool {
    true
}

fn default_page() -> i64 {
    1
}

fn default_per_page() -> i64 {
    50
}

/// Paginated search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse<T> {
    pub success: bool,
    pub query: String,
    pub results: Vec<T>,
    pub count: usize,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub total_pages: usize,
}

/// A single chat turn (user or assistant)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

/// Chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default = "default_true")]
    pub stream: bool,
}

/// Lenient deserializers for catalog attributes of uncertain type.
pub(crate) mod de {
    use super::*;
    use serde_json::Value;

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse().ok(),
            _ => None,
        })
    }

    /// Non-negative integral number or numeric string; `2.0` reads as 2.
    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(opt_number(d)?
            .filter(|v| v.is_finite() && *v >= 0.0 && *v <= u32::MAX as f64)
            .map(|v| v as u32))
    }

    pub fn opt_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
        Ok(opt_number(d)?.filter(|v| v.is_finite()).map(|v| v as f32))
    }

    pub fn opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Some(true),
                "false" | "no" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    /// `null` or a missing key become an empty list; malformed entries are skipped.
    pub fn list<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: serde::de::DeserializeOwned,
    {
        Ok(match Option::<Value>::deserialize(d)? {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| serde_json::from_value(v).ok())
                .collect(),
            _ => Vec::new(),
        })
    }
}
