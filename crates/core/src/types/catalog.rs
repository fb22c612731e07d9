//! Catalog records: products, categories and subcategories.
//!
//! These mirror the documents stored in the remote database. They are
//! read-only from the storefront's point of view.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId, SubcategoryId};
use super::price::Price;

/// Merchandising tag shown on a product card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Badge {
    Sale,
    New,
    Discount,
    /// Any tag this build does not know about yet.
    #[serde(other)]
    Other,
}

/// A product as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Price>,
    /// Slug or id of the owning category.
    pub category: String,
    /// Image URL, or a short emoji token used as a placeholder.
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub reviews: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,
    #[serde(default)]
    pub is_flash_deal: bool,
    #[serde(default)]
    pub show_in_hero: bool,
}

impl Product {
    /// Percentage off the original price, when the product is discounted.
    #[must_use]
    pub fn discount_percent(&self) -> Option<u8> {
        self.original_price
            .and_then(|original| self.price.discount_percent_from(original))
    }

    /// Whether `image` points at a picture rather than an emoji token.
    #[must_use]
    pub fn has_image_url(&self) -> bool {
        self.image.starts_with("https://")
            || self.image.starts_with("http://")
            || self.image.starts_with('/')
    }
}

/// A top-level catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub show_on_home: bool,
}

/// A subcategory nested under a [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    pub id: SubcategoryId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub icon: String,
    pub category_id: CategoryId,
    #[serde(default)]
    pub show_on_home: bool,
}

/// The three catalog collections bundled together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

impl Catalog {
    /// True when all three collections are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty() && self.categories.is_empty() && self.subcategories.is_empty()
    }

    /// Look up a product by id.
    #[must_use]
    pub fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|p| &p.id == id)
    }

    /// Look up a category by its slug.
    #[must_use]
    pub fn category_by_slug(&self, slug: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    /// Products filed under `category`, matched by slug or id.
    pub fn products_in<'a>(&'a self, category: &'a Category) -> impl Iterator<Item = &'a Product> {
        self.products
            .iter()
            .filter(move |p| p.category == category.slug || p.category == category.id.as_str())
    }

    /// Subcategories whose parent is `category`.
    pub fn subcategories_of<'a>(
        &'a self,
        category: &'a CategoryId,
    ) -> impl Iterator<Item = &'a Subcategory> {
        self.subcategories
            .iter()
            .filter(move |s| &s.category_id == category)
    }

    /// Products flagged as flash deals.
    pub fn flash_deals(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_flash_deal)
    }

    /// Products flagged for the home page hero.
    pub fn hero_products(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.show_in_hero)
    }

    /// Categories flagged for the home page.
    pub fn home_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|c| c.show_on_home)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Catalog {
        serde_json::from_value(json!({
            "products": [
                {"id": "p1", "name": "Headphones", "price": 59.99, "originalPrice": 79.99,
                 "category": "electronics", "image": "🎧", "rating": 4.5, "reviews": 120,
                 "badge": "sale", "isFlashDeal": true},
                {"id": "p2", "name": "Kettle", "price": 25, "category": "c-home",
                 "image": "https://cdn.example.com/kettle.png", "badge": "limited",
                 "showInHero": true}
            ],
            "categories": [
                {"id": "c-elec", "name": "Electronics", "slug": "electronics", "icon": "💻",
                 "showOnHome": true},
                {"id": "c-home", "name": "Home", "slug": "home", "icon": "🏠"}
            ],
            "subcategories": [
                {"id": "s1", "name": "Audio", "slug": "audio", "categoryId": "c-elec"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_decodes_remote_documents() {
        let catalog = sample();
        let headphones = &catalog.products[0];
        assert_eq!(headphones.badge, Some(Badge::Sale));
        assert_eq!(headphones.discount_percent(), Some(25));
        assert!(!headphones.has_image_url());
        assert!(headphones.is_flash_deal);

        let kettle = &catalog.products[1];
        assert_eq!(kettle.badge, Some(Badge::Other));
        assert!(kettle.has_image_url());
        assert_eq!(kettle.description, "");
    }

    #[test]
    fn test_category_lookups_match_slug_or_id() {
        let catalog = sample();
        let electronics = catalog.category_by_slug("electronics").unwrap();
        let home = catalog.category_by_slug("home").unwrap();

        assert_eq!(catalog.products_in(electronics).count(), 1);
        assert_eq!(catalog.products_in(home).count(), 1);
        assert_eq!(catalog.subcategories_of(&electronics.id).count(), 1);
        assert_eq!(catalog.subcategories_of(&home.id).count(), 0);
    }

    #[test]
    fn test_home_page_filters() {
        let catalog = sample();
        assert_eq!(catalog.flash_deals().count(), 1);
        assert_eq!(catalog.hero_products().next().unwrap().id.as_str(), "p2");
        assert_eq!(catalog.home_categories().count(), 1);
        assert!(!catalog.is_empty());
        assert!(Catalog::default().is_empty());
    }
}
