use crate::models::{Product, SearchFilters};

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
            && self.manufacturers.is_empty()
            && self.certifications.is_empty()
            && !self.has_certifications
            && !self.has_carbon_data
    }

    /// AND across filter kinds, any-match within a list.
    pub fn passes(&self, product: &Product) -> bool {
        if !self.categories.is_empty()
            && !product
                .category_names()
                .any(|c| self.categories.iter().any(|f| f == c))
        {
            return false;
        }

        if !self.manufacturers.is_empty() {
            match product.manufacturer_name.as_deref() {
                Some(m) if self.manufacturers.iter().any(|f| f == m) => {}
                _ => return false,
            }
        }

        if !self.certifications.is_empty()
            && !product
                .certification_names()
                .any(|c| self.certifications.iter().any(|f| f == c))
        {
            return false;
        }

        if self.has_certifications && !product.has_certifications() {
            return false;
        }

        if self.has_carbon_data && !product.has_carbon_data() {
            return false;
        }

        true
    }
}
