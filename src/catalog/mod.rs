//! In-memory product catalog with its filter indexes and embedding matrix.
//!
//! Built once at startup and shared read-only afterwards.

pub mod embeddings;
pub mod filter_index;

use serde::Serialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::models::{Product, SearchFilters};
pub use filter_index::{FilterIndex, NameCount};

const TOP_MANUFACTURER_OPTIONS: usize = 50;
const TOP_STATS: usize = 10;

#[derive(Debug)]
pub struct Catalog {
    products: Vec<Product>,
    filters: FilterIndex,
    /// Row `i` belongs to `products[i]`.
    embeddings: Option<Vec<Vec<f32>>>,
}

/// Filter choices offered to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub categories: Vec<NameCount>,
    pub manufacturers: Vec<NameCount>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SustainabilityStats {
    pub with_certifications: usize,
    pub with_carbon_data: usize,
    pub with_recycled_content: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_products: usize,
    pub total_categories: usize,
    pub total_manufacturers: usize,
    pub sustainability_stats: SustainabilityStats,
    pub top_categories: Vec<(String, usize)>,
    pub top_manufacturers: Vec<(String, usize)>,
}

impl Catalog {
    /// Parse a full catalog snapshot (a JSON array of products).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::DataSource(format!(
                "Product data file not found: {}",
                path.display()
            )));
        }
        tracing::info!("Loading products from {}", path.display());

        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::DataSource(format!("Failed to read {}: {e}", path.display())))?;
        let products: Vec<Product> = serde_json::from_str(&data)
            .map_err(|e| Error::DataSource(format!("Malformed catalog {}: {e}", path.display())))?;

        tracing::info!("Loaded {} products", products.len());
        Ok(Self::from_products(products))
    }

    pub fn from_products(mut products: Vec<Product>) -> Self {
        for product in &mut products {
            product.normalize();
        }
        let filters = FilterIndex::build(&products);
        Self {
            products,
            filters,
            embeddings: None,
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn filter_index(&self) -> &FilterIndex {
        &self.filters
    }

    /// Rebuild all lookup structures from the current product list.
    pub fn build_filter_indexes(&mut self) {
        self.filters = FilterIndex::build(&self.products);
    }

    /// Attach vectors produced for this exact product list.
    pub fn attach_embeddings(&mut self, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if embeddings.len() != self.products.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "{} embeddings for {} products",
                embeddings.len(),
                self.products.len()
            )));
        }
        self.embeddings = Some(embeddings);
        Ok(())
    }

    pub fn embeddings(&self) -> Option<&[Vec<f32>]> {
        self.embeddings.as_deref()
    }

    /// First product whose `id` has the same string form as `id`.
    pub fn get_by_id(&self, id: &str) -> Result<&Product> {
        self.products
            .iter()
            .find(|p| p.id.matches(id))
            .ok_or_else(|| Error::NotFound(format!("Product {}", id.trim())))
    }

    /// Products whose ids appear in `ids`, in catalog order. Unknown ids are
    /// dropped.
    pub fn get_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> Vec<&Product> {
        let wanted: std::collections::HashSet<&str> =
            ids.iter().map(|s| s.as_ref().trim()).collect();
        self.products
            .iter()
            .filter(|p| wanted.contains(p.id.key().as_str()))
            .collect()
    }

    /// Lookup across `id`, `product_id`, `sku` and `code`.
    pub fn find_by_any_id(&self, raw: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.matches_any_id(raw))
    }

    /// Catalog-order listing through the search filters.
    pub fn list_filtered(
        &self,
        filters: Option<&SearchFilters>,
        limit: Option<usize>,
    ) -> Vec<&Product> {
        self.products
            .iter()
            .filter(|p| filters.map_or(true, |f| f.passes(p)))
            .take(limit.unwrap_or(usize::MAX))
            .collect()
    }

    pub fn filter_options(&self) -> FilterOptions {
        let mut manufacturers = self.filters.manufacturers.by_count();
        manufacturers.truncate(TOP_MANUFACTURER_OPTIONS);
        FilterOptions {
            categories: self.filters.categories.by_count(),
            manufacturers,
            certifications: self.filters.certifications.iter().cloned().collect(),
        }
    }

    pub fn statistics(&self) -> CatalogStats {
        let top = |counts: Vec<NameCount>| -> Vec<(String, usize)> {
            counts
                .into_iter()
                .take(TOP_STATS)
                .map(|nc| (nc.name, nc.count))
                .collect()
        };

        CatalogStats {
            total_products: self.products.len(),
            total_categories: self.filters.categories.len(),
            total_manufacturers: self.filters.manufacturers.len(),
            sustainability_stats: SustainabilityStats {
                with_certifications: self
                    .products
                    .iter()
                    .filter(|p| p.has_certifications())
                    .count(),
                with_carbon_data: self.products.iter().filter(|p| p.has_carbon_data()).count(),
                with_recycled_content: self
                    .products
                    .iter()
                    .filter(|p| p.has_recycled_content())
                    .count(),
            },
            top_categories: top(self.filters.categories.by_count()),
            top_manufacturers: top(self.filters.manufacturers.by_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProductId;

    fn catalog() -> Catalog {
        let json = r#"[
            {"id": 1, "product_name": "Oak Floor", "manufacturer_name": "Acme",
             "product_categories": [{"category_name": "Flooring"}],
             "certifications": [{"certification": "FSC"}], "net_carbon_emissions": 3.2},
            {"id": "2", "product_name": "Clay Brick", "manufacturer_name": "Boral",
             "product_categories": [{"category_name": "Bricks"}], "sku": "BR-2"},
            {"id": 3, "product_name": "Bamboo Floor", "manufacturer_name": "Acme",
             "product_categories": [{"category_name": "Flooring"}],
             "recycled_content_percentage": 40}
        ]"#;
        Catalog::from_products(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_get_by_id_normalizes_forms() {
        let catalog = catalog();
        assert_eq!(catalog.get_by_id("2").unwrap().product_name.as_deref(), Some("Clay Brick"));
        assert_eq!(catalog.get_by_id("1").unwrap().id, ProductId::Num(1));
        assert!(matches!(catalog.get_by_id("99"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_get_by_ids_drops_missing() {
        let catalog = catalog();
        let found = catalog.get_by_ids(&["3", "1", "404"]);
        let ids: Vec<String> = found.iter().map(|p| p.id.key()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn test_find_by_any_id_uses_alternate_keys() {
        let catalog = catalog();
        assert_eq!(catalog.find_by_any_id("BR-2").unwrap().id.key(), "2");
        assert!(catalog.find_by_any_id("nope").is_none());
    }

    #[test]
    fn test_filter_options_and_statistics() {
        let catalog = catalog();
        let options = catalog.filter_options();
        assert_eq!(options.categories[0].name, "Flooring");
        assert_eq!(options.categories[0].count, 2);
        assert_eq!(options.manufacturers[0].name, "Acme");
        assert_eq!(options.certifications, vec!["FSC"]);

        let stats = catalog.statistics();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_categories, 2);
        assert_eq!(stats.sustainability_stats.with_certifications, 1);
        assert_eq!(stats.sustainability_stats.with_carbon_data, 1);
        assert_eq!(stats.sustainability_stats.with_recycled_content, 1);
        assert_eq!(stats.top_manufacturers[0], ("Acme".to_string(), 2));
    }

    #[test]
    fn test_attach_embeddings_requires_lockstep() {
        let mut catalog = catalog();
        assert!(catalog.attach_embeddings(vec![vec![1.0]; 2]).is_err());
        assert!(catalog.embeddings().is_none());
        catalog.attach_embeddings(vec![vec![1.0]; 3]).unwrap();
        assert_eq!(catalog.embeddings().unwrap().len(), 3);
    }

    #[test]
    fn test_load_missing_file_is_data_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::load(&dir.path().join("absent.json")).err().unwrap();
        assert!(matches!(err, Error::DataSource(_)));

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{not json").unwrap();
        assert!(matches!(Catalog::load(&bad), Err(Error::DataSource(_))));
    }

    #[test]
    fn test_list_filtered_respects_limit() {
        let catalog = catalog();
        let filters = SearchFilters {
            manufacturers: vec!["Acme".into()],
            ..SearchFilters::default()
        };
        assert_eq!(catalog.list_filtered(Some(&filters), None).len(), 2);
        assert_eq!(catalog.list_filtered(Some(&filters), Some(1)).len(), 1);
        assert_eq!(catalog.list_filtered(None, None).len(), 3);
    }
}
