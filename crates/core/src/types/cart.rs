//! Shopping cart line items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::id::ProductId;
use super::price::Price;

/// One line of the shopping cart.
///
/// A line is identified by the `(id, variant_key)` pair: the same product in
/// two configurations occupies two lines. `quantity` is always at least 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image: String,
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant_key: Option<String>,
}

impl CartItem {
    /// Exact identity match on `(id, variant_key)`.
    #[must_use]
    pub fn is_line(&self, id: &ProductId, variant_key: Option<&str>) -> bool {
        &self.id == id && self.variant_key.as_deref() == variant_key
    }

    /// Match used by remove/update: without a variant key every variant of
    /// the product matches.
    #[must_use]
    pub fn matches(&self, id: &ProductId, variant_key: Option<&str>) -> bool {
        match variant_key {
            Some(_) => self.is_line(id, variant_key),
            None => &self.id == id,
        }
    }

    /// Same line identity as `other`.
    #[must_use]
    pub fn same_line(&self, other: &Self) -> bool {
        self.is_line(&other.id, other.variant_key.as_deref())
    }

    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Product reference handed to the cart when the shopper presses "add".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub image: String,
    pub variant_key: Option<String>,
}

impl NewCartItem {
    /// Line for `product` with an optional variant.
    #[must_use]
    pub fn from_product(product: &Product, variant_key: Option<String>) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price,
            image: product.image.clone(),
            variant_key,
        }
    }

    /// Materialize as a fresh line with quantity 1.
    #[must_use]
    pub fn into_line(self) -> CartItem {
        CartItem {
            id: self.id,
            name: self.name,
            price: self.price,
            image: self.image,
            quantity: 1,
            variant_key: self.variant_key,
        }
    }
}

/// The remote mirror of a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(id: &str, variant: Option<&str>) -> CartItem {
        CartItem {
            id: ProductId::new(id),
            name: id.to_uppercase(),
            price: Price::from_cents(1000),
            image: String::new(),
            quantity: 2,
            variant_key: variant.map(str::to_owned),
        }
    }

    #[test]
    fn test_exact_line_identity() {
        let plain = line("a", None);
        let red = line("a", Some("red"));

        assert!(plain.is_line(&ProductId::new("a"), None));
        assert!(!plain.is_line(&ProductId::new("a"), Some("red")));
        assert!(red.is_line(&ProductId::new("a"), Some("red")));
        assert!(!plain.same_line(&red));
    }

    #[test]
    fn test_loose_match_without_variant() {
        let red = line("a", Some("red"));
        assert!(red.matches(&ProductId::new("a"), None));
        assert!(!red.matches(&ProductId::new("a"), Some("blue")));
        assert!(!red.matches(&ProductId::new("b"), None));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line("a", None).line_total(), Price::from_cents(2000));
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(line("a", Some("xl"))).unwrap();
        assert_eq!(json["variantKey"], "xl");
        assert_eq!(json["price"], 10.0);

        let without = serde_json::to_value(line("a", None)).unwrap();
        assert!(without.get("variantKey").is_none());
    }
}
