//! Static catalog bundled into the binary.
//!
//! Served for any collection that is empty or failing remotely, so the
//! storefront always has something to show.

use std::sync::LazyLock;

use bazaar_core::{Catalog, Category, Product, Subcategory};
use tracing::error;

static FALLBACK: LazyLock<Catalog> = LazyLock::new(|| {
    serde_json::from_str(include_str!("../../data/fallback_catalog.json")).unwrap_or_else(|e| {
        error!(error = %e, "bundled fallback catalog is invalid");
        Catalog::default()
    })
});

/// The whole bundled catalog.
pub fn catalog() -> &'static Catalog {
    &FALLBACK
}

pub fn products() -> Vec<Product> {
    FALLBACK.products.clone()
}

pub fn categories() -> Vec<Category> {
    FALLBACK.categories.clone()
}

pub fn subcategories() -> Vec<Subcategory> {
    FALLBACK.subcategories.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_catalog_is_complete() {
        let catalog = catalog();
        assert!(!catalog.products.is_empty());
        assert!(!catalog.categories.is_empty());
        assert!(!catalog.subcategories.is_empty());
    }

    #[test]
    fn test_bundled_catalog_is_consistent() {
        let catalog = catalog();
        for product in &catalog.products {
            assert!(
                catalog.category_by_slug(&product.category).is_some(),
                "{} has unknown category {}",
                product.id,
                product.category
            );
        }
        for sub in &catalog.subcategories {
            assert!(catalog.categories.iter().any(|c| c.id == sub.category_id));
        }
        assert!(catalog.flash_deals().count() > 0);
        assert!(catalog.hero_products().count() > 0);
    }
}
