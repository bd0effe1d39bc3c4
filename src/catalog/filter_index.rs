use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::models::{Product, ProductId};

/// Attribute value → product ids, remembering first-seen order of values.
#[derive(Debug, Default, Clone)]
pub struct Buckets {
    entries: Vec<(String, Vec<ProductId>)>,
    positions: HashMap<String, usize>,
}

/// A bucket name with its product count.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NameCount {
    pub name: String,
    pub count: usize,
}

impl Buckets {
    fn push(&mut self, name: &str, id: ProductId) {
        match self.positions.get(name) {
            Some(&pos) => self.entries[pos].1.push(id),
            None => {
                self.positions.insert(name.to_string(), self.entries.len());
                self.entries.push((name.to_string(), vec![id]));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&[ProductId]> {
        self.positions
            .get(name)
            .map(|&pos| self.entries[pos].1.as_slice())
    }

    /// Names ordered by count descending. Ties keep first-seen order.
    pub fn by_count(&self) -> Vec<NameCount> {
        let mut counts: Vec<NameCount> = self
            .entries
            .iter()
            .map(|(name, ids)| NameCount {
                name: name.clone(),
                count: ids.len(),
            })
            .collect();
        // sort_by is stable
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        counts
    }
}

/// Lookup structures derived from one catalog load. Always rebuilt whole.
#[derive(Debug, Default, Clone)]
pub struct FilterIndex {
    pub categories: Buckets,
    pub manufacturers: Buckets,
    pub certifications: BTreeSet<String>,
}

impl FilterIndex {
    pub fn build(products: &[Product]) -> Self {
        let mut index = Self::default();

        for product in products {
            for name in product.category_names() {
                index.categories.push(name, product.id.clone());
            }
            if let Some(manufacturer) = product.manufacturer_name.as_deref() {
                index.manufacturers.push(manufacturer, product.id.clone());
            }
            for name in product.certification_names() {
                index.certifications.insert(name.to_string());
            }
        }

        tracing::info!(
            "Filter indexes built: {} categories, {} manufacturers, {} certification types",
            index.categories.len(),
            index.manufacturers.len(),
            index.certifications.len()
        );
        index
    }
}
